//! Label and annotation merging for generated objects.

use std::collections::BTreeMap;

/// Annotation key fragments that are never copied from a Kernel onto the
/// objects generated for it.
pub const EXCLUDED_ANNOTATION_FRAGMENTS: [&str; 2] = ["kubectl", "kernel"];

/// Whether an annotation key is bookkeeping that must stay on the Kernel.
/// The match is a case sensitive substring match.
pub fn is_excluded_annotation(key: &str) -> bool {
    EXCLUDED_ANNOTATION_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}

/// `base` with every entry of `overlay` whose key `exclude` rejects copied
/// over it. Overlay entries win on conflicting keys.
pub fn merge_filtered<F>(
    base: BTreeMap<String, String>,
    overlay: &BTreeMap<String, String>,
    exclude: F,
) -> BTreeMap<String, String>
where
    F: Fn(&str) -> bool,
{
    let mut merged = base;
    merged.extend(
        overlay
            .iter()
            .filter(|(key, _)| !exclude(key))
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    merged
}

/// Labels for an object generated from the Kernel `name`: the Kernel's own
/// labels plus the name label.
pub fn generated_labels(
    name: &str,
    kernel_labels: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut labels = kernel_labels.cloned().unwrap_or_default();
    labels.insert(crate::api::KERNEL_NAME_LABEL.to_owned(), name.to_owned());
    labels
}

/// Annotations for an object generated from a Kernel: the Kernel's
/// annotations minus the excluded ones.
pub fn generated_annotations(
    kernel_annotations: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    match kernel_annotations {
        Some(annotations) => merge_filtered(BTreeMap::new(), annotations, is_excluded_annotation),
        None => BTreeMap::new(),
    }
}
