//! Command denylist.
//!
//! A command is refused when it *starts with* one of the configured entries.
//! This is plain prefix matching and nothing more: `" sudo ls"`, `"/usr/bin/sudo"`
//! or `"echo x; rm -rf /"` all pass. It keeps honest mistakes out; it is not a
//! sandbox and must not be treated as one.

#[derive(Debug, Clone)]
pub struct CommandValidator {
    denylist: Vec<String>,
}

impl CommandValidator {
    pub fn new(denylist: Vec<String>) -> Self {
        Self { denylist }
    }

    /// Returns `false` if `command` begins with any denylisted prefix.
    pub fn is_allowed(&self, command: &str) -> bool {
        !self
            .denylist
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DENYLIST;

    fn default_validator() -> CommandValidator {
        CommandValidator::new(DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn denies_prefixed_commands() {
        let v = default_validator();
        assert!(!v.is_allowed("rm -rf /"));
        assert!(!v.is_allowed("rm -rf"));
        assert!(!v.is_allowed("sudo reboot"));
        assert!(!v.is_allowed("sudoedit /etc/hosts"));
    }

    #[test]
    fn allows_everything_else() {
        let v = default_validator();
        assert!(v.is_allowed("echo hi"));
        assert!(v.is_allowed("rm file.txt"));
        assert!(v.is_allowed("ls -la"));
        assert!(v.is_allowed("/no/such/binary"));
    }

    #[test]
    fn prefix_matching_is_literal() {
        let v = default_validator();
        // Known gaps: the match is anchored at byte zero and case-sensitive.
        assert!(v.is_allowed(" sudo reboot"));
        assert!(v.is_allowed("SUDO reboot"));
        assert!(v.is_allowed("echo x; rm -rf /"));
        assert!(v.is_allowed("/usr/bin/sudo ls"));
    }

    #[test]
    fn empty_denylist_allows_all() {
        let v = CommandValidator::new(Vec::new());
        assert!(v.is_allowed("rm -rf /"));
        assert!(v.is_allowed("sudo reboot"));
    }

    #[test]
    fn custom_denylist() {
        let v = CommandValidator::new(vec!["shutdown".to_string(), "mkfs".to_string()]);
        assert!(!v.is_allowed("shutdown -h now"));
        assert!(!v.is_allowed("mkfs.ext4 /dev/sda"));
        assert!(v.is_allowed("sudo ls"));
    }
}
