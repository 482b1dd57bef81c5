//! secp160r1 arithmetic: point compression, decompression and ECDH.
//!
//! Short Weierstrass curve `y² = x³ − 3x + b` over the prime field `p`.
//! Public points are affine; the point at infinity is `None`. Scalar
//! multiplication runs in Jacobian coordinates.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Field element width in bytes.
pub const FIELD_BYTES: usize = 20;

/// Compressed point width: sign byte + x.
pub const COMPRESSED_LEN: usize = 1 + FIELD_BYTES;

/// Uncompressed point width: `0x04` + x + y.
pub const UNCOMPRESSED_LEN: usize = 1 + 2 * FIELD_BYTES;

/// Scalar width in bytes (the order `n` is 161 bits).
pub const SCALAR_BYTES: usize = 21;

const P_BYTES: [u8; 20] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f, 0xff, 0xff, 0xff,
];
const N_BYTES: [u8; 21] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0xf4, 0xc8, 0xf9, 0x27, 0xae, 0xd3, 0xca, 0x75, 0x22,
    0x57,
];
const B_BYTES: [u8; 20] = [
    0x1c, 0x97, 0xbe, 0xfc, 0x54, 0xbd, 0x7a, 0x8b, 0x65, 0xac,
    0xf8, 0x9f, 0x81, 0xd4, 0xd4, 0xad, 0xc5, 0x65, 0xfa, 0x45,
];
const GX_BYTES: [u8; 20] = [
    0x4a, 0x96, 0xb5, 0x68, 0x8e, 0xf5, 0x73, 0x28, 0x46, 0x64,
    0x69, 0x89, 0x68, 0xc3, 0x8b, 0xb9, 0x13, 0xcb, 0xfc, 0x82,
];
const GY_BYTES: [u8; 20] = [
    0x23, 0xa6, 0x28, 0x55, 0x31, 0x68, 0x94, 0x7d, 0x59, 0xdc,
    0xc9, 0x12, 0x04, 0x23, 0x51, 0x37, 0x7a, 0xc5, 0xfb, 0x32,
];

/// Affine point on the curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurvePoint {
    pub x: BigUint,
    pub y: BigUint,
}

/// Jacobian coordinates: `x = X/Z²`, `y = Y/Z³`; `Z = 0` is infinity.
#[derive(Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn from_affine(point: &CurvePoint) -> Self {
        Self {
            x: point.x.clone(),
            y: point.y.clone(),
            z: BigUint::one(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

/// Domain parameters.
pub struct Curve {
    pub p: BigUint,
    pub n: BigUint,
    pub b: BigUint,
    pub g: CurvePoint,
}

/// The secp160r1 parameters, built once.
pub fn secp160r1() -> &'static Curve {
    static CURVE: OnceLock<Curve> = OnceLock::new();
    CURVE.get_or_init(|| Curve {
        p: BigUint::from_bytes_be(&P_BYTES),
        n: BigUint::from_bytes_be(&N_BYTES),
        b: BigUint::from_bytes_be(&B_BYTES),
        g: CurvePoint {
            x: BigUint::from_bytes_be(&GX_BYTES),
            y: BigUint::from_bytes_be(&GY_BYTES),
        },
    })
}

impl Curve {
    fn add_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.p
    }

    fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        ((a + &self.p) - b) % &self.p
    }

    fn mul_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    // p is prime, so a^(p-2) is the inverse.
    fn inv_mod(&self, a: &BigUint) -> BigUint {
        let exp = &self.p - BigUint::from(2u8);
        a.modpow(&exp, &self.p)
    }

    /// `x³ − 3x + b mod p`
    fn rhs(&self, x: &BigUint) -> BigUint {
        let three = BigUint::from(3u8);
        let x2 = self.mul_mod(x, x);
        let x2_minus_3 = self.sub_mod(&x2, &three);
        let x3_minus_3x = self.mul_mod(&x2_minus_3, x);
        self.add_mod(&x3_minus_3x, &self.b)
    }

    /// `a^((p+1)/4) mod p`, squaring over the bits of `p + 1` from the top
    /// down to bit 2. Valid because `p ≡ 3 (mod 4)`.
    fn mod_sqrt(&self, a: &BigUint) -> BigUint {
        let p1 = &self.p + BigUint::one();
        let mut result = BigUint::one();
        for i in (2..p1.bits()).rev() {
            result = self.mul_mod(&result, &result);
            if p1.bit(i) {
                result = self.mul_mod(&result, a);
            }
        }
        result
    }

    pub fn is_on_curve(&self, point: &CurvePoint) -> bool {
        if point.x >= self.p || point.y >= self.p {
            return false;
        }
        self.mul_mod(&point.y, &point.y) == self.rhs(&point.x)
    }

    fn mul_small(&self, a: &BigUint, k: u32) -> BigUint {
        (a * k) % &self.p
    }

    fn to_affine(&self, point: &Jacobian) -> Option<CurvePoint> {
        if point.is_infinity() {
            return None;
        }
        let z_inv = self.inv_mod(&point.z);
        let z_inv2 = self.mul_mod(&z_inv, &z_inv);
        let z_inv3 = self.mul_mod(&z_inv2, &z_inv);
        Some(CurvePoint {
            x: self.mul_mod(&point.x, &z_inv2),
            y: self.mul_mod(&point.y, &z_inv3),
        })
    }

    // Doubling with a = −3: M = 3(X − Z²)(X + Z²).
    fn double(&self, a: &Jacobian) -> Jacobian {
        if a.is_infinity() || a.y.is_zero() {
            return Jacobian::infinity();
        }

        let y2 = self.mul_mod(&a.y, &a.y);
        let s = self.mul_small(&self.mul_mod(&a.x, &y2), 4);
        let z2 = self.mul_mod(&a.z, &a.z);
        let m = self.mul_small(
            &self.mul_mod(&self.sub_mod(&a.x, &z2), &self.add_mod(&a.x, &z2)),
            3,
        );

        let x3 = self.sub_mod(&self.mul_mod(&m, &m), &self.mul_small(&s, 2));
        let y3 = self.sub_mod(
            &self.mul_mod(&m, &self.sub_mod(&s, &x3)),
            &self.mul_small(&self.mul_mod(&y2, &y2), 8),
        );
        let z3 = self.mul_small(&self.mul_mod(&a.y, &a.z), 2);
        Jacobian { x: x3, y: y3, z: z3 }
    }

    fn add(&self, a: &Jacobian, b: &Jacobian) -> Jacobian {
        if a.is_infinity() {
            return b.clone();
        }
        if b.is_infinity() {
            return a.clone();
        }

        let z1z1 = self.mul_mod(&a.z, &a.z);
        let z2z2 = self.mul_mod(&b.z, &b.z);
        let u1 = self.mul_mod(&a.x, &z2z2);
        let u2 = self.mul_mod(&b.x, &z1z1);
        let s1 = self.mul_mod(&self.mul_mod(&a.y, &b.z), &z2z2);
        let s2 = self.mul_mod(&self.mul_mod(&b.y, &a.z), &z1z1);

        if u1 == u2 {
            if s1 == s2 {
                return self.double(a);
            }
            return Jacobian::infinity();
        }

        let h = self.sub_mod(&u2, &u1);
        let r = self.sub_mod(&s2, &s1);
        let h2 = self.mul_mod(&h, &h);
        let h3 = self.mul_mod(&h2, &h);
        let u1h2 = self.mul_mod(&u1, &h2);

        let x3 = self.sub_mod(
            &self.sub_mod(&self.mul_mod(&r, &r), &h3),
            &self.mul_small(&u1h2, 2),
        );
        let y3 = self.sub_mod(
            &self.mul_mod(&r, &self.sub_mod(&u1h2, &x3)),
            &self.mul_mod(&s1, &h3),
        );
        let z3 = self.mul_mod(&self.mul_mod(&a.z, &b.z), &h);
        Jacobian { x: x3, y: y3, z: z3 }
    }

    /// `k · point`, or `None` for the point at infinity.
    ///
    /// Montgomery ladder: one addition and one doubling per scalar bit.
    pub fn scalar_mult(&self, point: &CurvePoint, k: &BigUint) -> Option<CurvePoint> {
        let mut r0 = Jacobian::infinity();
        let mut r1 = Jacobian::from_affine(point);

        for i in (0..k.bits()).rev() {
            if k.bit(i) {
                r0 = self.add(&r0, &r1);
                r1 = self.double(&r1);
            } else {
                r1 = self.add(&r0, &r1);
                r0 = self.double(&r0);
            }
        }
        self.to_affine(&r0)
    }

    /// `k · G`
    pub fn base_mult(&self, k: &BigUint) -> Option<CurvePoint> {
        self.scalar_mult(&self.g, k)
    }

    /// Compressed encoding: `2 | (y & 1)` followed by x, zero padded.
    pub fn compress(&self, point: &CurvePoint) -> [u8; COMPRESSED_LEN] {
        let mut out = [0u8; COMPRESSED_LEN];
        out[0] = 2 | u8::from(point.y.bit(0));
        out[1..].copy_from_slice(&to_fixed_be(&point.x, FIELD_BYTES));
        out
    }

    /// Decode a compressed point. Anything that is not a 21-byte `02`/`03`
    /// encoding is tried as an uncompressed `04 | x | y` point instead.
    pub fn decompress(&self, data: &[u8]) -> Option<CurvePoint> {
        if data.len() != COMPRESSED_LEN || (data[0] != 0x02 && data[0] != 0x03) {
            return self.decode_uncompressed(data);
        }

        let x = BigUint::from_bytes_be(&data[1..]);
        if x >= self.p {
            return None;
        }

        let rhs = self.rhs(&x);
        let mut y = self.mod_sqrt(&rhs);
        if self.mul_mod(&y, &y) != rhs {
            // x is not on the curve
            return None;
        }

        let want_odd = data[0] & 0x01 == 1;
        if y.bit(0) != want_odd {
            if y.is_zero() {
                return None;
            }
            y = &self.p - &y;
        }

        Some(CurvePoint { x, y })
    }

    fn decode_uncompressed(&self, data: &[u8]) -> Option<CurvePoint> {
        if data.len() != UNCOMPRESSED_LEN || data[0] != 0x04 {
            return None;
        }
        let point = CurvePoint {
            x: BigUint::from_bytes_be(&data[1..1 + FIELD_BYTES]),
            y: BigUint::from_bytes_be(&data[1 + FIELD_BYTES..]),
        };
        self.is_on_curve(&point).then_some(point)
    }

    /// Diffie-Hellman: the x-coordinate of `k · point` as minimal big-endian
    /// bytes. Not hashed.
    pub fn ecdh(&self, point: &CurvePoint, k: &BigUint) -> Option<Vec<u8>> {
        self.scalar_mult(point, k).map(|shared| shared.x.to_bytes_be())
    }
}

/// Big-endian bytes left-padded with zeros to `width`.
pub fn to_fixed_be(n: &BigUint, width: usize) -> Vec<u8> {
    let raw = n.to_bytes_be();
    if raw.len() >= width {
        return raw[raw.len() - width..].to_vec();
    }
    let mut out = vec![0u8; width - raw.len()];
    out.extend_from_slice(&raw);
    out
}
