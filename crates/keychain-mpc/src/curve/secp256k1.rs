//! Shamir/Feldman arithmetic and ECDSA signing over secp256k1.

use k256::ecdsa::{RecoveryId, SigningKey};
use k256::elliptic_curve::{
    bigint::U256,
    ops::Reduce,
    sec1::{FromEncodedPoint, ToEncodedPoint},
    Field,
};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use rand::rngs::OsRng;

use keychain_core::{Error, Result};

/// Sample a random polynomial of degree `t - 1`. The constant term is
/// the group secret.
pub fn random_polynomial(t: u16) -> Vec<Scalar> {
    let mut rng = OsRng;
    (0..t).map(|_| Scalar::random(&mut rng)).collect()
}

/// Evaluate the polynomial at share index `x`.
pub fn evaluate(coefficients: &[Scalar], x: u32) -> Scalar {
    let x_scalar = Scalar::from(x as u64);
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;
    for coef in coefficients {
        result = result + (*coef * x_power);
        x_power = x_power * x_scalar;
    }
    result
}

/// Feldman commitments to the coefficients, as compressed points.
pub fn commitments(coefficients: &[Scalar]) -> Vec<Vec<u8>> {
    coefficients
        .iter()
        .map(|coef| {
            (ProjectivePoint::GENERATOR * coef)
                .to_affine()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec()
        })
        .collect()
}

/// Decode a compressed commitment point.
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::RecoveryFailed(format!("invalid commitment point: {}", e)))?;
    let affine_opt = AffinePoint::from_encoded_point(&encoded);
    let affine: AffinePoint = Option::<AffinePoint>::from(affine_opt)
        .ok_or_else(|| Error::RecoveryFailed("commitment is not on the curve".into()))?;
    Ok(ProjectivePoint::from(affine))
}

/// Evaluate the commitment polynomial at `x`: sum of C_j * x^j.
pub fn commitment_eval(commitments: &[Vec<u8>], x: u32) -> Result<ProjectivePoint> {
    let x_scalar = Scalar::from(x as u64);
    let mut actual = ProjectivePoint::IDENTITY;
    let mut x_power = Scalar::ONE;
    for commitment_bytes in commitments {
        let commitment = decode_point(commitment_bytes)?;
        actual = actual + (commitment * x_power);
        x_power = x_power * x_scalar;
    }
    Ok(actual)
}

/// Verify a share value against the ceremony commitments.
pub fn verify_share(index: u32, secret: &Scalar, commitments: &[Vec<u8>]) -> Result<()> {
    let expected = commitment_eval(commitments, index)?;
    if ProjectivePoint::GENERATOR * secret != expected {
        return Err(Error::RecoveryFailed(format!(
            "share {} does not match the ceremony commitments",
            index
        )));
    }
    Ok(())
}

/// Lagrange basis coefficient for point `i` evaluated at `x`. The
/// indices must be distinct.
pub fn lagrange_coefficient(indices: &[u32], i: u32, x: u32) -> Result<Scalar> {
    let xi = Scalar::from(i as u64);
    let x_scalar = Scalar::from(x as u64);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for &j in indices {
        if j == i {
            continue;
        }
        let xj = Scalar::from(j as u64);
        numerator = numerator * (x_scalar - xj);
        denominator = denominator * (xi - xj);
    }
    let inverse = Option::<Scalar>::from(denominator.invert())
        .ok_or_else(|| Error::RecoveryFailed("duplicate share indices".into()))?;
    Ok(numerator * inverse)
}

/// Interpolate the polynomial through `points` at `x`.
pub fn interpolate(points: &[(u32, Scalar)], x: u32) -> Result<Scalar> {
    let indices: Vec<u32> = points.iter().map(|(i, _)| *i).collect();
    let mut result = Scalar::ZERO;
    for (i, value) in points {
        let lambda = lagrange_coefficient(&indices, *i, x)?;
        result = result + (lambda * value);
    }
    Ok(result)
}

/// Pointwise sum of per-party commitment vectors: the commitments to
/// the joint sharing polynomial.
pub fn sum_commitments(per_party: &[Vec<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
    let degree = per_party.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut joint = Vec::with_capacity(degree);
    for j in 0..degree {
        let mut sum = ProjectivePoint::IDENTITY;
        for commitments in per_party {
            let bytes = commitments
                .get(j)
                .ok_or_else(|| Error::RecoveryFailed("mismatched commitment lengths".into()))?;
            sum = sum + decode_point(bytes)?;
        }
        joint.push(sum.to_affine().to_encoded_point(true).as_bytes().to_vec());
    }
    Ok(joint)
}

pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let share_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::RecoveryFailed("secret share must be 32 bytes".into()))?;
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&share_bytes.into()))
}

pub fn scalar_to_bytes(scalar: &Scalar) -> Vec<u8> {
    scalar.to_bytes().to_vec()
}

/// Compressed public point for a secret scalar.
pub fn public_key(secret: &Scalar) -> Vec<u8> {
    (ProjectivePoint::GENERATOR * secret)
        .to_affine()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}

/// Sign a 32-byte prehash with the group secret, returning
/// r || s || recovery_id. The signature is normalized to low-s form
/// and the recovery id flipped to match.
pub fn sign_prehash(secret: &Scalar, prehash: &[u8]) -> Result<Vec<u8>> {
    if prehash.len() != 32 {
        return Err(Error::SigningFailed(format!(
            "ECDSA digest must be 32 bytes, got {}",
            prehash.len()
        )));
    }
    let signing_key = SigningKey::from_bytes(&secret.to_bytes())
        .map_err(|e| Error::SigningFailed(format!("invalid group secret: {}", e)))?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(prehash)
        .map_err(|e| Error::SigningFailed(e.to_string()))?;
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => {
            let flipped = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                .ok_or_else(|| Error::Internal("recovery id out of range".into()))?;
            (normalized, flipped)
        }
        None => (signature, recovery_id),
    };
    let mut out = signature.to_bytes().to_vec();
    out.push(recovery_id.to_byte());
    Ok(out)
}
