use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Read-only-after-startup mapping from user name to shared secret (spec
/// §4.4's "Authentication gate"), loaded from a simple `user:pass` per line
/// credential file — the format the distillation left unspecified but
/// `original_source/` (`main.c`'s config handling) implies as the simplest
/// shape for this kind of flat auth file.
#[derive(Debug, Default)]
pub struct CredentialStore {
    users: HashMap<Vec<u8>, Vec<u8>>,
}

impl CredentialStore {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading credential file {}", path.display()))?;

        let mut users = HashMap::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (user, pass) = line
                .split_once(':')
                .with_context(|| format!("{}:{}: expected `user:pass`", path.display(), lineno + 1))?;
            users.insert(user.as_bytes().to_vec(), pass.as_bytes().to_vec());
        }

        Ok(Self { users })
    }

    pub fn verify(&self, user: &[u8], pass: &[u8]) -> bool {
        self.users.get(user).map(|p| p.as_slice()) == Some(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_verifies() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# comment\nalice:wonderland\nbob:builder\n").unwrap();

        let store = CredentialStore::load(f.path()).unwrap();
        assert!(store.verify(b"alice", b"wonderland"));
        assert!(!store.verify(b"alice", b"wrong"));
        assert!(!store.verify(b"carol", b"anything"));
    }
}
