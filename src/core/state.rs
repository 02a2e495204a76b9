use crate::core::Gate;
use crate::core::errors::{MeasurementError, StateError};
use crate::core::measurements::{Measurement, MeasurementResult};
use crate::core::utils::{find_duplicate, insert_bit, kronecker_product, trace};
use ndarray::{Array2, array};
use num_complex::Complex64;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct QuantumState {
    pub density_matrix: Array2<Complex64>,
    pub num_qubits: usize,
}

impl QuantumState {
    /// Creates a new quantum state initialized to |0...0>.
    ///
    /// A zero-qubit state is the 1x1 matrix `[1]`, the neutral element for
    /// [`QuantumState::push_qubit`].
    pub fn new(num_qubits: usize) -> Self {
        let dim = 1 << num_qubits;
        let mut density_matrix = Array2::<Complex64>::zeros((dim, dim));
        density_matrix[[0, 0]] = Complex64::new(1.0, 0.0);

        Self {
            density_matrix,
            num_qubits,
        }
    }

    /// Checks the validity of a density matrix
    fn check_density_matrix(matrix: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = matrix.dim();

        if rows != cols {
            return Err(StateError::DimensionMismatch {
                expected: rows,
                got_rows: rows,
                got_cols: cols,
            });
        }
        if !rows.is_power_of_two() {
            return Err(StateError::InvalidDimensions);
        }

        let tr = trace(matrix);
        if (tr - Complex64::new(1.0, 0.0)).norm() > 1e-9 {
            return Err(StateError::InvalidTrace(tr));
        }

        Ok(())
    }

    /// Apply an already extended operator to the whole system
    fn apply_operator(&mut self, u: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = u.dim();
        let dim = 1 << self.num_qubits;

        if rows != dim || cols != dim {
            return Err(StateError::DimensionMismatch {
                expected: dim,
                got_rows: rows,
                got_cols: cols,
            });
        }

        let temp = u.dot(&self.density_matrix);
        let u_dagger = u.t().mapv(|x| x.conj());
        self.density_matrix = temp.dot(&u_dagger);

        Ok(())
    }

    /// Checks if a given index is within the system's range
    fn validate_qubit_index(&self, index: usize) -> Result<(), StateError> {
        if index >= self.num_qubits {
            return Err(StateError::IndexOutOfBounds {
                index,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    /// Checks if a QuantumState is valid.
    pub fn is_valid(&self) -> Result<(), StateError> {
        Self::check_density_matrix(&self.density_matrix)
    }

    /// Applies non controlled quantum gate
    pub fn apply(&mut self, gate: &Gate, target_qubits: &[usize]) -> Result<(), StateError> {
        self.apply_controlled(gate, target_qubits, None)
    }

    /// Applies generic quantum gate
    pub fn apply_controlled(
        &mut self,
        gate: &Gate,
        target_qubits: &[usize],
        control_qubits: Option<&[usize]>,
    ) -> Result<(), StateError> {
        if gate.num_qubits != target_qubits.len() {
            return Err(StateError::DimensionMismatch {
                expected: gate.num_qubits,
                got_rows: target_qubits.len(),
                got_cols: 0,
            });
        }

        let controls = control_qubits.unwrap_or(&[]);
        for &q in target_qubits.iter().chain(controls) {
            self.validate_qubit_index(q)?;
        }

        let full_gate_operator = Gate::expand_gate(self.num_qubits, gate, target_qubits, controls)?;

        self.apply_operator(&full_gate_operator.matrix)
    }

    /// Returns the probability of each operator expanded to the whole system
    pub fn set_measurement(
        &self,
        measurement: &Measurement,
        target_qubits: &[usize],
    ) -> Result<(Vec<f64>, Vec<Array2<Complex64>>), StateError> {
        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        if let Some(dup) = find_duplicate(target_qubits) {
            return Err(StateError::MeasurementError(
                MeasurementError::DuplicateQubit(dup),
            ));
        }

        let expanded_ops = measurement.get_expanded_operators(self.num_qubits, target_qubits)?;

        let mut probs = Vec::with_capacity(expanded_ops.len());
        let mut sum_probs = 0.0;

        for op in &expanded_ops {
            let op_dagger = op.t().mapv(|c| c.conj());
            let unnormalized_rho_prime = op.dot(&self.density_matrix).dot(&op_dagger);
            let p_k = trace(&unnormalized_rho_prime).re.max(0.0);

            probs.push(p_k);
            sum_probs += p_k;
        }

        // Renormalize to absorb floating point drift
        for p in &mut probs {
            *p /= sum_probs;
        }

        Ok((probs, expanded_ops))
    }

    /// Randomly selects operator index weighted by `probs`
    fn pick_outcome<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
        let roll: f64 = rng.random();

        let mut cumulative = 0.0;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if roll < cumulative {
                return i;
            }
        }
        probs.len().saturating_sub(1)
    }

    /// Physical measurement which changes the state irretrievably
    pub fn measure<R: Rng + ?Sized>(
        &mut self,
        measurement: &Measurement,
        target_qubits: &[usize],
        rng: &mut R,
    ) -> Result<MeasurementResult, StateError> {
        let (probs, ops) = self.set_measurement(measurement, target_qubits)?;

        let outcome_idx = Self::pick_outcome(&probs, rng);
        let p_selected = probs[outcome_idx];

        if p_selected <= 1e-12 {
            return Err(StateError::InvalidTrace(Complex64::new(0.0, 0.0)));
        }

        // rho' = (M_k * rho * M_k†) / p_k
        let m_k = &ops[outcome_idx];
        let m_k_dagger = m_k.t().mapv(|c| c.conj());
        let numerator = m_k.dot(&self.density_matrix).dot(&m_k_dagger);
        let norm = trace(&numerator);
        self.density_matrix = numerator.mapv(|val| val / norm);

        Ok(MeasurementResult {
            index: outcome_idx,
            value: measurement.values[outcome_idx],
        })
    }

    /// Probability that measuring `index` in the computational basis yields 1.
    pub fn probability_of_one(&self, index: usize) -> Result<f64, StateError> {
        self.validate_qubit_index(index)?;
        let p: f64 = self
            .density_matrix
            .diag()
            .iter()
            .enumerate()
            .filter(|&(basis, _)| (basis >> index) & 1 == 1)
            .map(|(_, amp)| amp.re)
            .sum();
        Ok(p)
    }

    /// Tensors a fresh |0> onto the system as the new highest-index qubit and
    /// returns its index.
    pub fn push_qubit(&mut self) -> usize {
        let ket0 = array![
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)]
        ];
        self.density_matrix = kronecker_product(&ket0, &self.density_matrix);
        self.num_qubits += 1;
        self.num_qubits - 1
    }

    /// Removes qubit `index` by partial trace. Qubits above `index` move down
    /// by one position.
    pub fn trace_out(&mut self, index: usize) -> Result<(), StateError> {
        self.validate_qubit_index(index)?;

        let reduced_dim = 1 << (self.num_qubits - 1);
        let rho = &self.density_matrix;
        let reduced = Array2::from_shape_fn((reduced_dim, reduced_dim), |(i, j)| {
            (0..2)
                .map(|b| rho[[insert_bit(i, index, b), insert_bit(j, index, b)]])
                .sum::<Complex64>()
        });

        self.density_matrix = reduced;
        self.num_qubits -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn push_then_trace_out_restores_state() {
        let mut state = QuantumState::new(1);
        state.apply(&Gate::x(), &[0]).unwrap();
        let original = state.density_matrix.clone();

        let idx = state.push_qubit();
        assert_eq!(idx, 1);
        assert_eq!(state.num_qubits, 2);
        state.trace_out(1).unwrap();

        assert_eq!(state.density_matrix, original);
    }

    #[test]
    fn measuring_one_half_of_bell_pair_fixes_the_other() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut state = QuantumState::new(2);
            state.apply(&Gate::h(), &[0]).unwrap();
            state.apply(&Gate::cnot(), &[0, 1]).unwrap();

            let first = state.measure(&Measurement::z_basis(), &[0], &mut rng).unwrap();
            state.trace_out(0).unwrap();
            let p = state.probability_of_one(0).unwrap();
            let expected = if first.bit() { 1.0 } else { 0.0 };
            assert!((p - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn x_basis_measurement_of_plus_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = QuantumState::new(1);
        state.apply(&Gate::h(), &[0]).unwrap();
        let res = state.measure(&Measurement::x_basis(), &[0], &mut rng).unwrap();
        assert_eq!(res.index, 0);
    }

    #[test]
    fn out_of_range_target_is_reported() {
        let mut state = QuantumState::new(1);
        let err = state.apply(&Gate::x(), &[3]).unwrap_err();
        assert!(matches!(
            err,
            StateError::IndexOutOfBounds {
                index: 3,
                num_qubits: 1
            }
        ));
    }

    proptest! {
        #[test]
        fn trace_out_preserves_unit_trace(theta in 0.0f64..6.28, drop in 0usize..3) {
            let mut state = QuantumState::new(3);
            state.apply(&Gate::ry(theta), &[0]).unwrap();
            state.apply(&Gate::cnot(), &[0, 1]).unwrap();
            state.apply(&Gate::h(), &[2]).unwrap();
            state.trace_out(drop).unwrap();
            prop_assert_eq!(state.num_qubits, 2);
            prop_assert!(state.is_valid().is_ok());
        }
    }
}
