use ark_ec::AffineRepr;
use ark_ff::{Field, PrimeField};
use ark_serialize::CanonicalSerialize;
use blake2::{Blake2b512, Digest};
use sha3::Sha3_256;

/// Provides an iterator over the powers of a `Scalar`.
///
/// This struct is created by the `exp_iter` function.
pub struct ScalarExp<F: Field> {
    x: F,
    next_exp_x: F,
}

impl<F: Field> Iterator for ScalarExp<F> {
    type Item = F;

    fn next(&mut self) -> Option<F> {
        let exp_x = self.next_exp_x;
        self.next_exp_x *= self.x;
        Some(exp_x)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::max_value(), None)
    }
}

/// Return an iterator of the powers of `x`.
pub fn exp_iter<F: Field>(x: F) -> ScalarExp<F> {
    let next_exp_x = F::one();
    ScalarExp { x, next_exp_x }
}

/// Decomposes `value` into `exponent` digits of base `base`, least significant first.
/// Returns `None` when the value does not fit.
pub fn digits(mut value: u64, base: u64, exponent: usize) -> Option<Vec<u64>> {
    if base < 2 {
        return None;
    }
    let mut out = Vec::with_capacity(exponent);
    for _ in 0..exponent {
        out.push(value % base);
        value /= base;
    }
    if value != 0 {
        return None;
    }
    Some(out)
}

/// Hashes `bytes` to a point with try-and-increment.
pub fn affine_from_bytes_tai<C: AffineRepr>(bytes: &[u8]) -> C {
    for i in 0..=u8::max_value() {
        let mut sha = Sha3_256::new();
        sha.update(bytes);
        sha.update([i]);
        let buf = sha.finalize();
        let res = C::from_random_bytes(&buf);
        if let Some(point) = res {
            let point = point.clear_cofactor();
            if !point.is_zero() {
                return point;
            }
        }
    }
    panic!()
}

/// Hashes `bytes` to a uniformly distributed scalar by reducing a 512-bit digest.
pub fn hash_to_scalar<F: PrimeField>(bytes: &[u8]) -> F {
    let digest = Blake2b512::digest(bytes);
    F::from_le_bytes_mod_order(&digest)
}

/// Hashes the canonical encoding of `items`.
pub fn hash_serializable<F: PrimeField, T: CanonicalSerialize>(items: &[T]) -> F {
    let mut bytes = Vec::new();
    for item in items {
        if let Err(e) = item.serialize_compressed(&mut bytes) {
            panic!("{}", e)
        }
    }
    hash_to_scalar(&bytes)
}

pub fn field_as_bytes<F: Field>(field: &F) -> Vec<u8> {
    let mut bytes = Vec::new();
    if let Err(e) = field.serialize_compressed(&mut bytes) {
        panic!("{}", e)
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_bn254::{Fr as Scalar, G1Affine};

    #[test]
    fn exp_2_is_powers_of_2() {
        let exp_2: Vec<_> = exp_iter(Scalar::from(2u64)).take(4).collect();

        assert_eq!(exp_2[0], Scalar::from(1u64));
        assert_eq!(exp_2[1], Scalar::from(2u64));
        assert_eq!(exp_2[2], Scalar::from(4u64));
        assert_eq!(exp_2[3], Scalar::from(8u64));
    }

    #[test]
    fn digits_are_exact() {
        assert_eq!(digits(0, 100, 2), Some(vec![0, 0]));
        assert_eq!(digits(9999, 100, 2), Some(vec![99, 99]));
        assert_eq!(digits(4321, 10, 4), Some(vec![1, 2, 3, 4]));
        assert_eq!(digits(10_000, 100, 2), None);
        assert_eq!(digits(u64::MAX, 2, 64), Some(vec![1; 64]));
        assert_eq!(digits(5, 1, 8), None);
    }

    #[test]
    fn hashing_to_curve_is_deterministic() {
        let a: G1Affine = affine_from_bytes_tai(b"label");
        let b: G1Affine = affine_from_bytes_tai(b"label");
        let c: G1Affine = affine_from_bytes_tai(b"other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_on_curve());
    }

    #[test]
    fn hash_to_scalar_separates_inputs() {
        let a: Scalar = hash_to_scalar(b"ABC");
        let b: Scalar = hash_to_scalar(b"ABD");
        assert_ne!(a, b);
    }
}
