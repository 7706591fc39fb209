#[cfg(test)]
mod transform_tests {
    use libulc::dsp::{LappedTransform, ModulationWindow, WindowShape};
    use libulc::{EncoderConfig, EncoderState, UlcError};
    use std::f64::consts::PI;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Deterministic test signal with no dominant structure
    fn signal(len: usize) -> Vec<f32> {
        let mut state = 0x1234_5678u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    fn assert_close(got: &[f32], expected: &[f64], tol: f64, what: &str) {
        assert_eq!(got.len(), expected.len());
        for (k, (&g, &e)) in got.iter().zip(expected).enumerate() {
            assert!(
                (g as f64 - e).abs() < tol,
                "{what}[{k}]: got {g}, expected {e}"
            );
        }
    }

    // ============================================================================
    // DCT-IV kernel
    // ============================================================================

    #[test]
    fn test_dct_iv_matches_definition() {
        let mut transform = LappedTransform::new(256);
        for &n in &[16usize, 32, 64, 256] {
            let input = signal(n);
            let expected: Vec<f64> = (0..n)
                .map(|k| {
                    input
                        .iter()
                        .enumerate()
                        .map(|(i, &x)| {
                            x as f64
                                * (PI / n as f64 * (i as f64 + 0.5) * (k as f64 + 0.5)).cos()
                        })
                        .sum()
                })
                .collect();

            let mut data = input.clone();
            transform.dct_iv(&mut data);
            assert_close(&data, &expected, 1e-3, &format!("dct{n}"));
        }
    }

    #[test]
    fn test_dct_iv_is_involution() {
        let mut transform = LappedTransform::new(128);
        let input = signal(128);
        let mut data = input.clone();
        transform.dct_iv(&mut data);
        transform.dct_iv(&mut data);
        // DCT-IV applied twice scales by N/2
        for (x, y) in input.iter().zip(&data) {
            assert!((x * 64.0 - y).abs() < 5e-3);
        }
    }

    // ============================================================================
    // Lapped MDCT / MDST
    // ============================================================================

    /// Direct windowed MDCT and MDST of one subblock of size `n` whose core
    /// starts at `x[core]`, with left/right overlaps `ol`/`or`
    fn direct(
        x: &[f32],
        core: usize,
        n: usize,
        rise_l: &[f32],
        rise_r: &[f32],
    ) -> (Vec<f64>, Vec<f64>) {
        let (ol, or) = (rise_l.len(), rise_r.len());
        let window = |i: usize| -> f64 {
            // frame index i covers x[core - n/2 + i]
            let left_start = n / 2 - ol / 2;
            let right_start = 3 * n / 2 - or / 2;
            let w_left = if i < left_start {
                0.0
            } else if i < left_start + ol {
                rise_l[i - left_start] as f64
            } else {
                1.0
            };
            let w_right = if i < right_start {
                1.0
            } else if i < right_start + or {
                rise_r[or - 1 - (i - right_start)] as f64
            } else {
                0.0
            };
            w_left * w_right
        };

        let mut mdct = vec![0.0f64; n];
        let mut mdst = vec![0.0f64; n];
        for i in 0..2 * n {
            let w = window(i);
            if w == 0.0 {
                continue;
            }
            let v = w * x[core + i - n / 2] as f64;
            for k in 0..n {
                let arg = PI / n as f64 * (i as f64 + 0.5 + n as f64 / 2.0) * (k as f64 + 0.5);
                mdct[k] += v * arg.cos();
                mdst[k] += v * arg.sin();
            }
        }
        (mdct, mdst)
    }

    fn check_lapped(n: usize, ol: usize, or: usize, shape: WindowShape) {
        let window = ModulationWindow::new(shape, 256);
        let rise_l = window.rising(ol);
        let rise_r = window.rising(or);

        let core = n;
        let x = signal(3 * n);
        let lead_in: Vec<f32> = (0..ol / 2)
            .map(|i| rise_l[i] * x[core - ol / 2 + i])
            .collect();

        let mut transform = LappedTransform::new(256);
        let mut mdct = vec![0.0f32; n];
        let mut mdst = vec![0.0f32; n];
        transform.forward(
            &x[core..core + n + or / 2],
            &lead_in,
            rise_l,
            rise_r,
            &mut mdct,
            &mut mdst,
        );

        let (exp_c, exp_s) = direct(&x, core, n, rise_l, rise_r);
        let what = format!("n {n}, ol {ol}, or {or}");
        assert_close(&mdct, &exp_c, 2e-3, &format!("mdct {what}"));
        assert_close(&mdst, &exp_s, 2e-3, &format!("mdst {what}"));
    }

    #[test]
    fn test_lapped_transform_full_overlap() {
        check_lapped(64, 64, 64, WindowShape::Sine);
        check_lapped(256, 256, 256, WindowShape::Vorbis);
    }

    #[test]
    fn test_lapped_transform_asymmetric_overlap() {
        check_lapped(64, 16, 32, WindowShape::Sine);
        check_lapped(64, 64, 16, WindowShape::Sine);
        check_lapped(128, 32, 128, WindowShape::KaiserBesselDerived);
        check_lapped(32, 16, 32, WindowShape::Vorbis);
    }

    // ============================================================================
    // Modulation windows
    // ============================================================================

    #[test]
    fn test_windows_are_power_complementary() {
        for shape in [
            WindowShape::Sine,
            WindowShape::Vorbis,
            WindowShape::KaiserBesselDerived,
        ] {
            let window = ModulationWindow::new(shape, 512);
            assert_eq!(window.as_slice().len(), ModulationWindow::table_len(512));
            let mut len = 16;
            while len <= 512 {
                let r = window.rising(len);
                assert_eq!(r.len(), len);
                for i in 0..len {
                    let p = r[i] * r[i] + r[len - 1 - i] * r[len - 1 - i];
                    assert!((p - 1.0).abs() < 1e-4, "{shape:?} {len} [{i}]: {p}");
                    assert!((0.0..=1.0).contains(&r[i]));
                }
                // rising
                assert!(r[0] < r[len - 1]);
                len *= 2;
            }
        }
    }

    #[test]
    fn test_custom_window_length_is_checked() {
        init();
        assert_eq!(ModulationWindow::table_len(64), 112);
        let err = ModulationWindow::custom(64, vec![1.0; 111]).err();
        assert!(matches!(
            err,
            Some(UlcError::InvalidWindow {
                expected: 112,
                got: 111
            })
        ));

        // accepted with a warning
        let flat = ModulationWindow::custom(64, vec![1.0; 112]).unwrap();
        assert_eq!(flat.rising(32), &[1.0f32; 32][..]);
    }

    // ============================================================================
    // Block transform
    // ============================================================================

    #[test]
    fn test_tone_ranks_its_bin_first() {
        init();
        let block_size = 1024;
        let bin = 100;
        let config = EncoderConfig {
            use_psychoacoustics: false,
            use_window_switching: false,
            ..EncoderConfig::new(44100, 1, block_size)
        };
        let mut encoder = EncoderState::new(config).unwrap();

        for b in 0..3 {
            let block: Vec<f32> = (0..block_size)
                .map(|n| {
                    let t = (b * block_size + n) as f64;
                    (0.5 * (PI * (bin as f64 + 0.5) * t / block_size as f64).sin()) as f32
                })
                .collect();
            encoder.analyze_block(&block).unwrap();
        }

        let top = encoder.ranks().iter().position(|&r| r == 0).unwrap();
        assert!(top.abs_diff(bin) <= 1, "top coefficient {top}");
        assert!(encoder.block_complexity() < 0.5);
    }

    #[test]
    fn test_identical_stereo_channels_leave_side_empty() {
        init();
        let block_size = 512;
        let config = EncoderConfig::new(44100, 2, block_size);
        let mut encoder = EncoderState::new(config).unwrap();

        for b in 0..3 {
            let mono: Vec<f32> = (0..block_size)
                .map(|n| {
                    let t = (b * block_size + n) as f64 / 44100.0;
                    (0.4 * (2.0 * PI * 2500.0 * t).sin()) as f32
                })
                .collect();
            let mut block = mono.clone();
            block.extend_from_slice(&mono);
            encoder.analyze_block(&block).unwrap();
        }

        assert!(encoder.coefficients()[block_size..].iter().all(|&c| c == 0.0));
        assert!(encoder.usable_coefficients() <= block_size);
        let top = encoder.ranks().iter().position(|&r| r == 0).unwrap();
        assert!(top < block_size);
    }

    #[test]
    fn test_ranks_are_a_permutation() {
        init();
        let config = EncoderConfig::new(44100, 2, 256);
        let mut encoder = EncoderState::new(config).unwrap();
        let noise = signal(512 * 3);
        for block in noise.chunks(512) {
            encoder.analyze_block(block).unwrap();
        }

        let mut seen = vec![false; 512];
        for &r in encoder.ranks() {
            assert!(!seen[r as usize]);
            seen[r as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));

        let c = encoder.block_complexity();
        assert!((0.0..=1.0).contains(&c));
        assert!(c > 0.5, "noise should be complex, got {c}");
    }
}
