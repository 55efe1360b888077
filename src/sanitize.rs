//! Mapping of remote titles onto filesystem-safe names

/// Characters that cannot appear in a file or directory name on common filesystems
const FORBIDDEN: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace every forbidden character with a space and trim surrounding whitespace.
///
/// Total over all inputs. A title made only of forbidden characters and
/// whitespace sanitizes to the empty string.
///
/// ```
/// use mediaserver_mirror::sanitize::sanitize;
///
/// assert_eq!(sanitize("Math: Lecture 1/2"), "Math  Lecture 1 2");
/// ```
pub fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
