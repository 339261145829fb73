use opgraph_types::ImportToken;

/// Produces collision-free names for conflict renames.
///
/// A conflicting `name` becomes `name + marker + token`. File names keep
/// their extension last, so `run.log` becomes `run<marker><token>.log`.
/// If that is taken too, `_2`, `_3`, ... are added the same way.
#[derive(Clone, Debug)]
pub struct ConflictNamer {
    marker: String,
    token: ImportToken,
}

impl ConflictNamer {
    pub fn new(marker: impl Into<String>, token: ImportToken) -> Self {
        Self {
            marker: marker.into(),
            token,
        }
    }

    pub fn token(&self) -> &ImportToken {
        &self.token
    }

    /// The text inserted into every conflicting name.
    pub fn suffix(&self) -> String {
        format!("{}{}", self.marker, self.token)
    }

    /// Conflict name for a directory, section, compound, or process.
    pub fn conflict_name(&self, name: &str, taken: impl Fn(&str) -> bool) -> String {
        let base = format!("{name}{}", self.suffix());
        first_free(|n| match n {
            1 => base.clone(),
            n => format!("{base}_{n}"),
        }, taken)
    }

    /// Conflict name for a file: the suffix goes before the extension.
    pub fn file_conflict_name(&self, name: &str, taken: impl Fn(&str) -> bool) -> String {
        let (stem, ext) = split_extension(name);
        let suffix = self.suffix();
        first_free(|n| match n {
            1 => format!("{stem}{suffix}{ext}"),
            n => format!("{stem}{suffix}_{n}{ext}"),
        }, taken)
    }
}

fn first_free(candidate: impl Fn(usize) -> String, taken: impl Fn(&str) -> bool) -> String {
    let mut n = 1;
    loop {
        let name = candidate(n);
        if !taken(&name) {
            return name;
        }
        n += 1;
    }
}

/// Split `name` into stem and extension (with its dot). Dotfiles and names
/// without a dot have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) => name.split_at(i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namer() -> ConflictNamer {
        ConflictNamer::new("_ImportConflict_", ImportToken::new("T1").unwrap())
    }

    #[test]
    fn appends_marker_and_token() {
        assert_eq!(namer().conflict_name("A", |_| false), "A_ImportConflict_T1");
    }

    #[test]
    fn counts_up_when_taken() {
        let taken = ["Logs_ImportConflict_T1", "Logs_ImportConflict_T1_2"];
        assert_eq!(
            namer().conflict_name("Logs", |n| taken.contains(&n)),
            "Logs_ImportConflict_T1_3"
        );
    }

    #[test]
    fn file_names_keep_extension() {
        let n = namer();
        assert_eq!(n.file_conflict_name("run.log", |_| false), "run_ImportConflict_T1.log");
        assert_eq!(n.file_conflict_name("a.tar.gz", |_| false), "a.tar_ImportConflict_T1.gz");
        assert_eq!(n.file_conflict_name("Makefile", |_| false), "Makefile_ImportConflict_T1");
        assert_eq!(n.file_conflict_name(".env", |_| false), ".env_ImportConflict_T1");
        assert_eq!(
            n.file_conflict_name("run.log", |x| x == "run_ImportConflict_T1.log"),
            "run_ImportConflict_T1_2.log"
        );
    }
}
