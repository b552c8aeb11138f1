//! Random parameter generation

use rand::Rng;

use super::{HeaderRange, ObfuscationParams};

/// Lowest header value handed out; 0-4 stay clear of the standard types
const HEADER_BASE: u64 = 5;

/// Random prefix lengths in 1..=7
pub fn random_prefixes<R: Rng + ?Sized>(rng: &mut R) -> [u16; 4] {
    std::array::from_fn(|_| rng.gen_range(1..=7))
}

/// Random header ranges, one per quarter of `5..=u32::MAX`, so the four
/// ranges never overlap.
pub fn random_headers<R: Rng + ?Sized>(rng: &mut R) -> [HeaderRange; 4] {
    let total = u32::MAX as u64 - (HEADER_BASE - 1);
    let segment = total / 4;

    std::array::from_fn(|k| {
        let start = HEADER_BASE + k as u64 * (segment + 1);
        let end = if k == 3 { u32::MAX as u64 + 1 } else { start + segment };
        let min = rng.gen_range(start..start + segment / 2);
        let max = rng.gen_range(min..end);
        HeaderRange::new(min as u32, max as u32)
    })
}

/// A complete random configuration: jc 2-6, jmin 64-128, jmax 128-256,
/// random prefixes and headers. Signature packets are left empty.
pub fn random_params<R: Rng + ?Sized>(rng: &mut R) -> ObfuscationParams {
    let jmin = rng.gen_range(64..=128);
    let jmax = rng.gen_range(128u16..=256).max(jmin);
    let mut params = ObfuscationParams {
        jc: rng.gen_range(2..=6),
        jmin,
        jmax,
        ..Default::default()
    };
    params.set_prefixes(random_prefixes(rng));
    params.set_headers(random_headers(rng));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::validate::{check, Severity};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_params_are_valid() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let params = random_params(&mut rng);
            assert!((2..=6).contains(&params.jc));
            assert!(params.jmin <= params.jmax);
            assert!(params.prefixes().iter().all(|s| (1..=7).contains(s)));
            assert!(params.i1.is_empty());
            assert!(params.clone().validated().is_ok());
            assert!(
                check(&params).iter().all(|f| f.severity != Severity::Error),
                "seed {} produced {:?}",
                seed,
                check(&params)
            );
        }
    }

    #[test]
    fn test_headers_are_disjoint_and_ordered() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let headers = random_headers(&mut rng);
            for pair in headers.windows(2) {
                assert!(pair[0].min <= pair[0].max);
                assert!(pair[0].max < pair[1].min);
            }
            assert!(headers[0].min >= HEADER_BASE as u32);
        }
    }
}
