//! Shamir/Feldman arithmetic and Schnorr signing over ed25519.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};

use keychain_core::{Error, Result};

/// Uniform random scalar from 64 bytes of OS entropy.
pub fn random_scalar() -> Scalar {
    let mut wide = [0u8; 64];
    OsRng.fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Sample a random polynomial of degree `t - 1`. The constant term is
/// the group secret.
pub fn random_polynomial(t: u16) -> Vec<Scalar> {
    (0..t).map(|_| random_scalar()).collect()
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
        .map(|coef| EdwardsPoint::mul_base(coef).compress().to_bytes().to_vec())
        .collect()
}

/// Decode a compressed commitment point.
pub fn decode_point(bytes: &[u8]) -> Result<EdwardsPoint> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::RecoveryFailed("commitment point must be 32 bytes".into()))?;
    CompressedEdwardsY(array)
        .decompress()
        .ok_or_else(|| Error::RecoveryFailed("commitment is not on the curve".into()))
}

/// Evaluate the commitment polynomial at `x`: sum of C_j * x^j.
pub fn commitment_eval(commitments: &[Vec<u8>], x: u32) -> Result<EdwardsPoint> {
    let x_scalar = Scalar::from(x as u64);
    let mut actual = EdwardsPoint::identity();
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
    if EdwardsPoint::mul_base(secret) != expected {
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
    if denominator == Scalar::ZERO {
        return Err(Error::RecoveryFailed("duplicate share indices".into()));
    }
    Ok(numerator * denominator.invert())
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

/// Pointwise sum of per-party commitment vectors.
pub fn sum_commitments(per_party: &[Vec<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
    let degree = per_party.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut joint = Vec::with_capacity(degree);
    for j in 0..degree {
        let mut sum = EdwardsPoint::identity();
        for commitments in per_party {
            let bytes = commitments
                .get(j)
                .ok_or_else(|| Error::RecoveryFailed("mismatched commitment lengths".into()))?;
            sum = sum + decode_point(bytes)?;
        }
        joint.push(sum.compress().to_bytes().to_vec());
    }
    Ok(joint)
}

/// Compressed sum of already-encoded points.
pub fn sum_points<'a, I>(points: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut sum = EdwardsPoint::identity();
    for bytes in points {
        sum = sum + decode_point(bytes)?;
    }
    Ok(sum.compress().to_bytes().to_vec())
}

pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let share_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::RecoveryFailed("secret share must be 32 bytes".into()))?;
    Ok(Scalar::from_bytes_mod_order(share_bytes))
}

pub fn scalar_to_bytes(scalar: &Scalar) -> Vec<u8> {
    scalar.to_bytes().to_vec()
}

/// Compressed public point for a secret scalar.
pub fn public_key(secret: &Scalar) -> Vec<u8> {
    EdwardsPoint::mul_base(secret).compress().to_bytes().to_vec()
}

/// RFC 8032 challenge: SHA-512(R || A || M) reduced mod the group order.
pub fn challenge(r_point: &[u8], public_key: &[u8], message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(r_point);
    hasher.update(public_key);
    hasher.update(message);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Sign a message with the group secret: R = r*B, s = r + c*a, where c
/// is the RFC 8032 challenge. Returns R || s, 64 bytes. The nonce is
/// random rather than derived, as every signer holds only a share of
/// the key in the distributed setting this mirrors.
pub fn sign(secret: &Scalar, message: &[u8]) -> Vec<u8> {
    let public = public_key(secret);
    let r = random_scalar();
    let r_point = EdwardsPoint::mul_base(&r).compress().to_bytes();
    let c = challenge(&r_point, &public, message);
    let s = r + c * secret;
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r_point);
    out.extend_from_slice(&s.to_bytes());
    out
}

/// Base58 keypair export, secret followed by public: the conventional
/// ed25519 wallet interchange encoding.
pub fn keypair_base58(secret: &Scalar) -> String {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&secret.to_bytes());
    bytes.extend_from_slice(&public_key(secret));
    bs58::encode(bytes).into_string()
}
