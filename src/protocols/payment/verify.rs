//! Sifting and the accept/reject decision.

use super::{Decision, MerchantMessage, PaymentError};

/// Outcome of verifying one payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub client_id: String,
    pub measured: Vec<bool>,
    pub merchant_id: String,
    pub verification_basis: Vec<bool>,
    /// Positions where the bank's preparation basis equals the verification basis
    pub coincident: Vec<usize>,
    pub mismatches: usize,
    /// `None` when nothing coincided
    pub error_rate: Option<f64>,
    pub decision: Decision,
}

/// Positions where the two bases agree. Values play no part.
pub fn sift(bank_basis: &[bool], verification_basis: &[bool]) -> Vec<usize> {
    bank_basis
        .iter()
        .zip(verification_basis)
        .enumerate()
        .filter(|(_, (a, b))| a == b)
        .map(|(i, _)| i)
        .collect()
}

/// Fraction of `coincident` positions where the prepared value differs from
/// the measured one, along with the raw mismatch count.
pub fn error_rate(
    values: &[bool],
    measured: &[bool],
    coincident: &[usize],
) -> Result<(usize, f64), PaymentError> {
    if coincident.is_empty() {
        return Err(PaymentError::NoCoincidence);
    }
    let mismatches = coincident
        .iter()
        .filter(|&&i| values.get(i) != measured.get(i))
        .count();
    Ok((mismatches, mismatches as f64 / coincident.len() as f64))
}

/// Decides a payment from the bank's preparation and the forwarded report.
///
/// Accepts iff the error rate is strictly below `threshold`; no coincident
/// position at all is a reject.
pub fn verify(
    bank_basis: &[bool],
    bank_values: &[bool],
    report: MerchantMessage,
    verification_basis: Vec<bool>,
    threshold: f64,
) -> Transaction {
    let coincident = sift(bank_basis, &verification_basis);
    let (mismatches, rate, decision) = match error_rate(bank_values, &report.bits, &coincident) {
        Ok((mismatches, rate)) if rate < threshold => (mismatches, Some(rate), Decision::Accept),
        Ok((mismatches, rate)) => (mismatches, Some(rate), Decision::Reject),
        Err(_) => (0, None, Decision::Reject),
    };

    Transaction {
        client_id: report.client_id,
        measured: report.bits,
        merchant_id: report.merchant_id,
        verification_basis,
        coincident,
        mismatches,
        error_rate: rate,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn report(bits: Vec<bool>) -> MerchantMessage {
        MerchantMessage {
            client_id: "alice".into(),
            bits,
            merchant_id: "shop".into(),
        }
    }

    #[test]
    fn perfect_agreement_is_accepted() {
        let basis = vec![false, true, true, false];
        let values = vec![true, true, false, false];
        let tx = verify(&basis, &values, report(values.clone()), basis.clone(), 0.1);
        assert_eq!(tx.coincident, vec![0, 1, 2, 3]);
        assert_eq!(tx.error_rate, Some(0.0));
        assert_eq!(tx.decision, Decision::Accept);
    }

    #[test]
    fn mismatches_at_threshold_are_rejected() {
        let basis = vec![false; 4];
        let values = vec![false; 4];
        let measured = vec![true, false, false, false];
        let tx = verify(&basis, &values, report(measured), basis.clone(), 0.25);
        assert_eq!(tx.mismatches, 1);
        assert_eq!(tx.error_rate, Some(0.25));
        assert_eq!(tx.decision, Decision::Reject);
    }

    #[test]
    fn mismatches_outside_coincidences_are_ignored() {
        let basis = vec![false, true];
        let verification = vec![false, false];
        let values = vec![true, true];
        let measured = vec![true, false];
        let tx = verify(&basis, &values, report(measured), verification, 0.1);
        assert_eq!(tx.coincident, vec![0]);
        assert_eq!(tx.decision, Decision::Accept);
    }

    #[test]
    fn no_coincidence_is_a_reject() {
        let basis = vec![true, true];
        let verification = vec![false, false];
        assert_eq!(
            error_rate(&[true, true], &[true, true], &sift(&basis, &verification)),
            Err(PaymentError::NoCoincidence)
        );
        let tx = verify(&basis, &[true, true], report(vec![true, true]), verification, 0.5);
        assert_eq!(tx.error_rate, None);
        assert_eq!(tx.decision, Decision::Reject);
    }

    proptest! {
        #[test]
        fn sifting_ignores_values(
            bases in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..64),
            flips in proptest::collection::vec(any::<bool>(), 64),
        ) {
            let (bank, verification): (Vec<bool>, Vec<bool>) = bases.into_iter().unzip();
            let values_a = vec![false; bank.len()];
            let values_b: Vec<bool> = flips[..bank.len()].to_vec();

            let tx_a = verify(&bank, &values_a, report(values_a.clone()), verification.clone(), 0.5);
            let tx_b = verify(&bank, &values_b, report(values_a.clone()), verification.clone(), 0.5);

            prop_assert_eq!(&tx_a.coincident, &tx_b.coincident);
            prop_assert_eq!(tx_a.coincident, sift(&bank, &verification));
        }
    }
}
