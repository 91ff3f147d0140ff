//! Email gateway access rules.
//!
//! A rule is `call,access,pattern`. The first rule whose call is the
//! station in question (or `*`) and whose pattern matches the address
//! decides; with no matching rule, access is denied.

use std::fmt;
use std::str::FromStr;

/// Which directions a rule opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Both,
    Incoming,
    Outgoing,
}

impl Access {
    fn allows(&self, wanted: Access) -> bool {
        *self == Access::Both || *self == wanted
    }
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Both" => Ok(Access::Both),
            "Incoming" => Ok(Access::Incoming),
            "Outgoing" => Ok(Access::Outgoing),
            other => Err(format!("unknown access type {:?}", other)),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::Both => "Both",
            Access::Incoming => "Incoming",
            Access::Outgoing => "Outgoing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    /// Station callsign or `*`.
    pub call: String,
    pub access: Access,
    /// Shell-style wildcard over the whole address.
    pub pattern: String,
}

impl AccessRule {
    pub fn new(call: impl Into<String>, access: Access, pattern: impl Into<String>) -> Self {
        Self {
            call: call.into(),
            access,
            pattern: pattern.into(),
        }
    }

    /// Parse `call,access,pattern`. The pattern may itself contain commas.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut parts = spec.splitn(3, ',');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(call), Some(access), Some(pattern)) => Ok(Self::new(
                call.trim(),
                access.trim().parse()?,
                pattern.trim(),
            )),
            _ => Err(format!("bad access rule {:?}", spec)),
        }
    }

    fn applies(&self, call: &str, addr: &str) -> bool {
        (self.call == call || self.call == "*") && wildcard_match(&self.pattern, addr)
    }
}

/// Ordered email access rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAccess {
    rules: Vec<AccessRule>,
}

impl EmailAccess {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Parse rule strings, skipping (and logging) bad ones.
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Self {
        let rules = specs
            .iter()
            .filter_map(|s| match AccessRule::parse(s.as_ref()) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    log::warn!("Ignoring email access rule: {}", e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    fn validate(&self, call: &str, addr: &str, wanted: Access) -> bool {
        match self.rules.iter().find(|r| r.applies(call, addr)) {
            Some(rule) => rule.access.allows(wanted),
            None => {
                log::debug!("No email access rule for {} -> {}", call, addr);
                false
            }
        }
    }

    /// May mail from `addr` reach `call`?
    pub fn validate_incoming(&self, call: &str, addr: &str) -> bool {
        self.validate(call, addr, Access::Incoming)
    }

    /// May `call` send mail to `addr`?
    pub fn validate_outgoing(&self, call: &str, addr: &str) -> bool {
        self.validate(call, addr, Access::Outgoing)
    }
}

/// Match `text` against a pattern where `*` is any run and `?` any single
/// character. ASCII case is ignored.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
