/// Case-folded form of a single name, used for every comparison and lookup.
pub fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Splits a path string into its normal segments.
///
/// Both `/` and `\` separate segments (archives produced on Windows use the latter),
/// empty segments and `.` are skipped, `..` drops the previous segment and never
/// climbs above the root.
pub fn split(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name.to_string()),
        }
    }
    parts
}

/// `true` if `name` can be used as a single path segment.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_normalizes() {
        assert_eq!(split("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(split("a//b/./c/"), vec!["a", "b", "c"]);
        assert_eq!(split("a\\b\\c.txt"), vec!["a", "b", "c.txt"]);
        assert_eq!(split("/a/b/../c"), vec!["a", "c"]);
        assert_eq!(split("/../.."), Vec::<String>::new());
        assert!(split("/").is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold("Meshes"), "meshes");
        assert_eq!(fold("ÄPFEL.TXT"), "äpfel.txt");
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("plugin.esp"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
    }
}
