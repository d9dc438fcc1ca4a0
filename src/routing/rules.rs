//! Route targets and policy rule sequence

use crate::routing::Operation;
use ipnetwork::IpNetwork;

/// Table whose default route is removed before custom tables take over
pub const MAIN_TABLE: &str = "main";

/// Priority of the `lookup main` fallback, same as the kernel's default rule
pub const MAIN_RULE_PRIORITY: u32 = 32766;

/// Priority of the `lookup default` fallback, same as the kernel's default rule
pub const DEFAULT_RULE_PRIORITY: u32 = 32767;

/// Whether a route target is a literal network. Host bits are permitted and
/// a bare address counts as a host route.
pub fn is_literal_cidr(target: &str) -> bool {
    target.parse::<IpNetwork>().is_ok()
}

/// The two fallback rules re-added after a rule flush
pub fn fallback_rules() -> [String; 2] {
    [
        format!("from all lookup main pref {}", MAIN_RULE_PRIORITY),
        format!("from all lookup default pref {}", DEFAULT_RULE_PRIORITY),
    ]
}

/// Flush all policy rules, restore the fallbacks, then add user rules verbatim
pub fn rule_operations<S: AsRef<str>>(user_rules: &[S]) -> Vec<Operation> {
    let mut operations = Vec::with_capacity(user_rules.len() + 3);
    operations.push(Operation::FlushRules);
    operations.extend(
        fallback_rules()
            .into_iter()
            .map(|clause| Operation::AddRule { clause }),
    );
    operations.extend(user_rules.iter().map(|rule| Operation::AddRule {
        clause: rule.as_ref().to_string(),
    }));
    operations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_cidr() {
        assert!(is_literal_cidr("0.0.0.0/0"));
        assert!(is_literal_cidr("10.0.0.0/8"));
        assert!(is_literal_cidr("10.1.2.3/8"));
        assert!(is_literal_cidr("192.0.2.7"));
        assert!(is_literal_cidr("2001:db8::/32"));

        assert!(!is_literal_cidr("corp"));
        assert!(!is_literal_cidr("10.0.0.0/33"));
        assert!(!is_literal_cidr(""));
    }

    #[test]
    fn test_empty_user_rules() {
        assert_eq!(
            rule_operations::<&str>(&[]),
            vec![
                Operation::FlushRules,
                Operation::AddRule {
                    clause: "from all lookup main pref 32766".to_string()
                },
                Operation::AddRule {
                    clause: "from all lookup default pref 32767".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_user_rules_follow_fallbacks_in_order() {
        let operations = rule_operations(&[
            "from 10.0.0.0/8 lookup 100 pref 100",
            "fwmark 0x1 lookup 200 pref 200",
        ]);

        assert_eq!(operations.len(), 5);
        assert_eq!(operations[0], Operation::FlushRules);
        assert_eq!(
            operations[3],
            Operation::AddRule {
                clause: "from 10.0.0.0/8 lookup 100 pref 100".to_string()
            }
        );
        assert_eq!(
            operations[4],
            Operation::AddRule {
                clause: "fwmark 0x1 lookup 200 pref 200".to_string()
            }
        );
    }

    #[test]
    fn test_user_rule_clause_kept_verbatim() {
        let operations = rule_operations(&["  from all fwmark 0x2  lookup 200 pref 150 "]);

        assert_eq!(
            operations.last(),
            Some(&Operation::AddRule {
                clause: "  from all fwmark 0x2  lookup 200 pref 150 ".to_string()
            })
        );
    }
}
