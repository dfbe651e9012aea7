use crate::utils::capitalize;

/// Maps a dotted schema key to an output type name.
///
/// `("TL_", "help.asd")` becomes `TL_help_Asd` and `("TL_", "asd")` becomes
/// `TL_Asd`. The first segment of a dotted key keeps its case.
pub fn resolve_name(prefix: &str, name: &str) -> String {
    let mut segments = name.split('.');
    match (segments.next(), segments.next()) {
        (Some(first), Some(second)) => {
            let rest: Vec<String> = std::iter::once(second)
                .chain(segments)
                .map(capitalize)
                .collect();
            format!("{}{}_{}", prefix, first, rest.join("_"))
        }
        _ => format!("{}{}", prefix, capitalize(name)),
    }
}
