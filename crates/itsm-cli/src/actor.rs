//! Actor identity recorded in audit entries.
//!
//! The resolution chain: `--actor` flag > `ITSM_ACTOR` env > user config
//! `actor` > `USER` env (TTY only) > `"system"`. Every command gets an actor;
//! unattended runs are attributed to `system`.

use std::env;

/// Name used when nothing more specific is available.
pub const DEFAULT_ACTOR: &str = "system";

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(
    cli_flag: Option<&str>,
    config_actor: Option<&str>,
    env: &dyn EnvReader,
) -> String {
    let non_empty = |v: &&str| !v.trim().is_empty();

    if let Some(actor) = cli_flag.filter(non_empty) {
        return actor.trim().to_string();
    }

    if let Some(val) = env.get("ITSM_ACTOR") {
        return val.trim().to_string();
    }

    if let Some(actor) = config_actor.filter(non_empty) {
        return actor.trim().to_string();
    }

    if env.is_tty()
        && let Some(val) = env.get("USER")
    {
        return val;
    }

    DEFAULT_ACTOR.to_string()
}

/// Resolve the acting identity for audit entries.
pub fn resolve_actor(cli_flag: Option<&str>, config_actor: Option<&str>) -> String {
    resolve_actor_with(cli_flag, config_actor, &RealEnv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("ITSM_ACTOR", "env-actor").tty().var("USER", "bob");
        assert_eq!(resolve_actor_with(Some("flag"), Some("config"), &env), "flag");
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("ITSM_ACTOR", "env-actor");
        assert_eq!(resolve_actor_with(None, Some("config"), &env), "env-actor");
    }

    #[test]
    fn config_beats_user() {
        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_actor_with(None, Some("service-desk"), &env), "service-desk");
    }

    #[test]
    fn blank_flag_and_config_ignored() {
        let env = MockEnv::new().var("ITSM_ACTOR", "env-actor");
        assert_eq!(resolve_actor_with(Some("  "), Some(""), &env), "env-actor");
    }

    #[test]
    fn user_env_only_in_tty() {
        let env = MockEnv::new().var("USER", "bob");
        assert_eq!(resolve_actor_with(None, None, &env), DEFAULT_ACTOR);

        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_actor_with(None, None, &env), "bob");
    }

    #[test]
    fn nothing_set_falls_back_to_system() {
        assert_eq!(resolve_actor_with(None, None, &MockEnv::new()), "system");
    }
}
