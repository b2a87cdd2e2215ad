/// Canonical form used to compare program output with the expected answer
///
/// Missing text becomes the empty string. Otherwise outer ASCII control and
/// space characters (up to U+0020) are trimmed and every `\r\n` or lone `\r`
/// becomes `\n`. Nothing else is touched: inner spacing, letter case and
/// Unicode spaces such as U+00A0 still have to match exactly.
pub fn normalize(text: Option<&str>) -> String {
    match text {
        None => String::new(),
        Some(text) => text
            .trim_matches(|c: char| c <= ' ')
            .replace("\r\n", "\n")
            .replace('\r', "\n"),
    }
}
