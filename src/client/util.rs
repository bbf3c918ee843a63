//! Argument and path helpers for shelling out to `p4`.

/// Upper bound on the joined length of one chunk of command arguments.
///
/// Close to the platform command-line limit, with margin left for the
/// command prefix (`p4 -ztag -u ... -c ... <cmd>`).
pub(crate) const MAX_ARG_LEN: usize = 8000;

/// Splits `args` into consecutive chunks whose joined length (arguments
/// separated by single spaces) stays at or under `max_len`.
///
/// Order is preserved and every argument lands in exactly one chunk. An
/// argument longer than `max_len` still gets a chunk of its own; the `p4`
/// invocation for it will fail on its own terms rather than being dropped
/// here.
pub(crate) fn chunk_args(args: &[String], max_len: usize) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for arg in args {
        // +1 for the separating space when the chunk is not empty.
        let added = arg.len() + if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current_len + added > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += if current.is_empty() { arg.len() } else { added };
        current.push(arg.clone());
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Normalizes a folder path into the recursive depot wildcard form
/// `path/...`, accepting either separator and any trailing slashes.
pub(crate) fn folder_wildcard(folder: &str, recursive: bool) -> String {
    let cleaned = folder.replace('\\', "/");
    let cleaned = cleaned.trim_end_matches('/');
    if recursive {
        format!("{}/...", cleaned)
    } else {
        format!("{}/*", cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn short_lists_stay_in_one_chunk() {
        let chunks = chunk_args(&args(&["a", "b", "c"]), 100);
        assert_eq!(chunks, vec![args(&["a", "b", "c"])]);
    }

    #[test]
    fn empty_input_yields_one_empty_chunk() {
        let chunks = chunk_args(&[], 100);
        assert_eq!(chunks, vec![Vec::<String>::new()]);
    }

    #[test]
    fn chunks_respect_the_limit_and_preserve_order() {
        let input = args(&["aaaa", "bbbb", "cccc", "dddd"]);
        let chunks = chunk_args(&input, 9);

        for chunk in &chunks {
            assert!(chunk.join(" ").len() <= 9, "chunk too long: {:?}", chunk);
        }
        let flattened: Vec<String> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn oversized_argument_gets_its_own_chunk() {
        let input = args(&["short", "this-argument-is-way-too-long", "tail"]);
        let chunks = chunk_args(&input, 10);
        assert!(chunks.contains(&args(&["this-argument-is-way-too-long"])));
        let flattened: Vec<String> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn folder_wildcard_normalizes_separators_and_slashes() {
        assert_eq!(folder_wildcard("//depot/proj", true), "//depot/proj/...");
        assert_eq!(folder_wildcard("//depot/proj/", true), "//depot/proj/...");
        assert_eq!(
            folder_wildcard("C:\\work\\proj\\", true),
            "C:/work/proj/..."
        );
        assert_eq!(folder_wildcard("//depot/proj", false), "//depot/proj/*");
    }
}
