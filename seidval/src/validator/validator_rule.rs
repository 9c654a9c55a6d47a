//! The rule abstraction evaluated by a [`CertificateValidator`](crate::CertificateValidator) and
//! a small boolean expression tree for combining rules.

use log::debug;

use crate::util::error::{Error, Result};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::ParsedCertificate;

/// A single check applied to a certificate. Implementations fail with
/// [`Error::Validation`] naming the reason the certificate was rejected.
pub trait ValidatorRule: Send + Sync {
    /// Evaluates the rule against `cert` as of `toi`.
    fn validate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()>;

    /// Short name used when logging
    fn name(&self) -> &'static str;
}

/// [`RuleExpr`] combines rules with AND and OR. Both combinators evaluate their operands left to
/// right and stop as soon as the outcome is known.
pub enum RuleExpr {
    /// A single rule
    Leaf(Box<dyn ValidatorRule>),
    /// Passes when every operand passes. Reports the first failure.
    And(Vec<RuleExpr>),
    /// Passes when any operand passes. Reports the failure of the last operand when none pass.
    Or(Vec<RuleExpr>),
}

impl RuleExpr {
    /// Wraps `rule` in a [`RuleExpr::Leaf`].
    pub fn leaf(rule: impl ValidatorRule + 'static) -> Self {
        RuleExpr::Leaf(Box::new(rule))
    }

    /// Evaluates the expression against `cert` as of `toi`.
    pub fn evaluate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()> {
        match self {
            RuleExpr::Leaf(rule) => rule.validate(cert, toi),
            RuleExpr::And(operands) => {
                for operand in operands {
                    operand.evaluate(cert, toi)?;
                }
                Ok(())
            }
            RuleExpr::Or(operands) => {
                let mut last = Err(Error::Config("empty OR expression".to_string()));
                for operand in operands {
                    last = operand.evaluate(cert, toi);
                    match &last {
                        Ok(()) => return Ok(()),
                        Err(e) => debug!("OR operand {} failed: {e}", operand.describe()),
                    }
                }
                last
            }
        }
    }

    /// Renders the expression using rule names, i.e. `(issuer AND chain) OR chain`.
    pub fn describe(&self) -> String {
        let join = |operands: &[RuleExpr], op: &str| {
            operands
                .iter()
                .map(|o| match o {
                    RuleExpr::Leaf(_) => o.describe(),
                    _ => format!("({})", o.describe()),
                })
                .collect::<Vec<String>>()
                .join(op)
        };
        match self {
            RuleExpr::Leaf(rule) => rule.name().to_string(),
            RuleExpr::And(operands) => join(operands, " AND "),
            RuleExpr::Or(operands) => join(operands, " OR "),
        }
    }
}

impl ValidatorRule for RuleExpr {
    fn validate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()> {
        self.evaluate(cert, toi)
    }

    fn name(&self) -> &'static str {
        match self {
            RuleExpr::Leaf(rule) => rule.name(),
            RuleExpr::And(_) => "and",
            RuleExpr::Or(_) => "or",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::ValidationFailure;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        outcome: Option<ValidationFailure>,
        calls: Arc<AtomicUsize>,
    }

    impl ValidatorRule for Fixed {
        fn validate(&self, _cert: &ParsedCertificate, _toi: TimeOfInterest) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Some(vf) => Err(Error::Validation(vf.clone())),
                None => Ok(()),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn fixed(
        name: &'static str,
        outcome: Option<ValidationFailure>,
        calls: &Arc<AtomicUsize>,
    ) -> RuleExpr {
        RuleExpr::leaf(Fixed {
            name,
            outcome,
            calls: calls.clone(),
        })
    }

    fn cert() -> ParsedCertificate {
        ParsedCertificate::from_pem(include_str!("../../tests/examples/test_valid.pem")).unwrap()
    }

    #[test]
    fn and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let expr = RuleExpr::And(vec![
            fixed("a", Some(ValidationFailure::IssuerMismatch), &calls),
            fixed("b", None, &calls),
        ]);
        assert_eq!(
            expr.evaluate(&cert(), TimeOfInterest::now().unwrap()),
            Err(Error::Validation(ValidationFailure::IssuerMismatch))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn or_short_circuits_and_reports_last() {
        let calls = Arc::new(AtomicUsize::new(0));
        let expr = RuleExpr::Or(vec![
            fixed("a", None, &calls),
            fixed("b", Some(ValidationFailure::PolicyAbsent), &calls),
        ]);
        assert!(expr.evaluate(&cert(), TimeOfInterest::now().unwrap()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let expr = RuleExpr::Or(vec![
            RuleExpr::And(vec![
                fixed("issuer", Some(ValidationFailure::IssuerMismatch), &calls),
                fixed("chain", None, &calls),
            ]),
            fixed("chain", Some(ValidationFailure::PolicyAbsent), &calls),
        ]);
        assert_eq!(
            expr.evaluate(&cert(), TimeOfInterest::now().unwrap()),
            Err(Error::Validation(ValidationFailure::PolicyAbsent))
        );
        assert_eq!(expr.describe(), "(issuer AND chain) OR chain");
        assert!(RuleExpr::Or(vec![])
            .evaluate(&cert(), TimeOfInterest::now().unwrap())
            .is_err());
        assert!(RuleExpr::And(vec![])
            .evaluate(&cert(), TimeOfInterest::now().unwrap())
            .is_ok());
    }
}
