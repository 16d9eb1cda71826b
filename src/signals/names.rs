/// Signal names and numbers as numbered on Linux.
pub const SIGNALS: &[(&str, i32)] = &[
    ("SIGHUP", 1),
    ("SIGINT", 2),
    ("SIGQUIT", 3),
    ("SIGILL", 4),
    ("SIGTRAP", 5),
    ("SIGABRT", 6),
    ("SIGBUS", 7),
    ("SIGFPE", 8),
    ("SIGKILL", 9),
    ("SIGUSR1", 10),
    ("SIGSEGV", 11),
    ("SIGUSR2", 12),
    ("SIGPIPE", 13),
    ("SIGALRM", 14),
    ("SIGTERM", 15),
    ("SIGSTKFLT", 16),
    ("SIGCHLD", 17),
    ("SIGCONT", 18),
    ("SIGSTOP", 19),
    ("SIGTSTP", 20),
    ("SIGTTIN", 21),
    ("SIGTTOU", 22),
    ("SIGURG", 23),
    ("SIGXCPU", 24),
    ("SIGXFSZ", 25),
    ("SIGVTALRM", 26),
    ("SIGPROF", 27),
    ("SIGWINCH", 28),
    ("SIGIO", 29),
    ("SIGPWR", 30),
    ("SIGSYS", 31),
];

/// Signals that can be neither caught nor ignored.
pub const FATAL_SIGNALS: &[&str] = &["SIGKILL", "SIGSTOP"];

/// Signals left alone by default: no handler is installed for them.
pub const DEFAULT_IGNORED: &[&str] = &[
    "SIGALRM", "SIGCHLD", "SIGURG", "SIGIO", "SIGVTALRM", "SIGPROF", "SIGWINCH", "SIGPOLL",
    "SIGTRAP", "SIGTERM", "SIGQUIT", "SIGILL", "SIGINT",
];

pub fn lookup_signame(num: i32) -> Option<&'static str> {
    SIGNALS
        .iter()
        .find(|(_, n)| *n == num)
        .map(|(name, _)| *name)
}

/// Accepts names with or without the `SIG` prefix.
pub fn lookup_signum(name: &str) -> Option<i32> {
    let name = name.to_ascii_uppercase();
    let full = if name.starts_with("SIG") {
        name
    } else {
        format!("SIG{name}")
    };
    SIGNALS
        .iter()
        .find(|(candidate, _)| *candidate == full)
        .map(|(_, n)| *n)
}

pub fn is_fatal(name: &str) -> bool {
    FATAL_SIGNALS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_number_round_trip() {
        for (name, num) in SIGNALS {
            assert_eq!(lookup_signame(*num), Some(*name));
            assert_eq!(lookup_signum(name), Some(*num));
            assert_eq!(lookup_signum(&name[3..]), Some(*num));
        }
    }

    #[test]
    fn test_unknown_signals() {
        assert_eq!(lookup_signame(0), None);
        assert_eq!(lookup_signame(64), None);
        assert_eq!(lookup_signum("SIGFOO"), None);
        assert_eq!(lookup_signum("usr1"), Some(10));
    }
}
