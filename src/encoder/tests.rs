//! Internal encoder tests

use super::*;
use crate::core::NybbleReader;

const UNRANKED: u32 = 1000;

/// Mono analysis of one undecimated block with the given coded coefficients
fn crafted(block_size: usize, coded: &[(usize, f32)]) -> BlockAnalysis {
    let mut analysis = BlockAnalysis::new(block_size).unwrap();
    analysis.ranks.fill(UNRANKED);
    for (rank, &(idx, value)) in coded.iter().enumerate() {
        analysis.coefs[idx] = value;
        analysis.ranks[idx] = rank as u32;
    }
    analysis.usable = coded.len();
    analysis
}

fn encode(analysis: &BlockAnalysis, noise_fill: bool, cutoff: usize) -> (Vec<u8>, usize) {
    let mut out = NybbleWriter::new();
    let bits = encode::encode_pass(analysis, 64, 1, noise_fill, cutoff, &mut out);
    (out.into_bytes(), bits)
}

#[test]
fn test_single_coefficient_stream() {
    let analysis = crafted(64, &[(40, 0.5)]);
    let (bytes, bits) = encode(&analysis, false, 1);

    // header, qi 5, 40 zeros, +4, stop
    assert_eq!(bytes, vec![0x00, 0x00, 0x41, 0x48, 0x0E, 0xF0]);
    assert_eq!(bits, 48);
}

#[test]
fn test_cutoff_zero_codes_nothing() {
    let analysis = crafted(64, &[(40, 0.5)]);
    let (bytes, bits) = encode(&analysis, false, 0);
    assert_eq!(bytes, vec![0x0E, 0xF0]);
    assert_eq!(bits, 16);
}

#[test]
fn test_cutoff_is_capped_to_usable() {
    let analysis = crafted(64, &[(40, 0.5)]);
    let (capped, _) = encode(&analysis, false, 1);
    let (huge, _) = encode(&analysis, false, 64);
    assert_eq!(capped, huge);
}

#[test]
fn test_quantizer_zone_breaks_on_magnitude_drop() {
    let analysis = crafted(64, &[(10, 1.0), (11, 0.001)]);
    let (bytes, bits) = encode(&analysis, false, 2);

    // header, qi 5, 10 zeros, +6, lead qi 14, +4, lead stop
    let nybbles: Vec<u8> = NybbleReader::new(&bytes).collect();
    assert_eq!(
        &nybbles[..13],
        &[0x0, 0x0, 0x8, 0xA, 0x6, 0x8, 0x0, 0x9, 0x4, 0x8, 0x0, 0xE, 0xF]
    );
    assert_eq!(bits, 56);
}

#[test]
fn test_negative_coefficient_is_twos_complement() {
    let analysis = crafted(64, &[(0, -0.5)]);
    let (bytes, _) = encode(&analysis, false, 1);
    let nybbles: Vec<u8> = NybbleReader::new(&bytes).collect();
    assert_eq!(nybbles[2], 0xC);
}

#[test]
fn test_noise_fill_tail() {
    let mut analysis = crafted(64, &[(0, 0.5)]);
    analysis.noise.fill(0.5f32.ln());
    let (bytes, bits) = encode(&analysis, true, 1);

    // header, qi 5, +4, lead F, level 4, decay 0
    assert_eq!(bytes, vec![0x00, 0x48, 0x0F, 0x60]);
    assert_eq!(bits, 32);
}

#[test]
fn test_noise_fill_run_between_coefficients() {
    let mut analysis = crafted(64, &[(0, 0.5), (40, 0.5)]);
    analysis.noise.fill(0.5f32.ln());
    let (bytes, bits) = encode(&analysis, true, 2);

    // header, qi 5, +4, noise run 39 @ 4, +4, noise tail
    assert_eq!(bytes, vec![0x00, 0x40, 0x0B, 0x94, 0x80, 0xF6, 0x00]);
    assert_eq!(bits, 56);
}

#[test]
fn test_quiet_noise_falls_back_to_zero_runs() {
    let mut analysis = crafted(64, &[(0, 0.5), (40, 0.5)]);
    analysis.noise.fill(-30.0);
    let (with_fill, _) = encode(&analysis, true, 2);
    let (without, _) = encode(&analysis, false, 2);
    assert_eq!(with_fill, without);
}

#[test]
fn test_short_tail_is_a_zero_run() {
    let analysis = crafted(64, &[(60, 0.5)]);
    let (bytes, _) = encode(&analysis, false, 1);
    let nybbles: Vec<u8> = NybbleReader::new(&bytes).collect();

    // header, qi 5, 60 zeros, +4, 8 3, padding
    assert_eq!(nybbles.len(), 10);
    assert_eq!(&nybbles[6..9], &[0x4, 0x8, 0x3]);
}

#[test]
fn test_search_cutoff_finds_largest_fit() {
    let mut calls = Vec::new();
    let (cutoff, size) = rate::search_cutoff(50, 100, |c| {
        calls.push(c);
        16 + 8 * c
    });
    assert_eq!(cutoff, 10);
    assert_eq!(size, 96);
    assert_eq!(calls.last(), Some(&10));
}

#[test]
fn test_search_cutoff_when_nothing_fits() {
    let mut calls = Vec::new();
    let (cutoff, size) = rate::search_cutoff(50, 8, |c| {
        calls.push(c);
        16 + 8 * c
    });
    assert_eq!(cutoff, 0);
    assert_eq!(size, 16);
    assert_eq!(calls.last(), Some(&0));
}

#[test]
fn test_search_cutoff_everything_fits() {
    let (cutoff, _) = rate::search_cutoff(50, usize::MAX, |c| 16 + 8 * c);
    assert_eq!(cutoff, 50);
}

#[test]
fn test_impulse_after_silence_decimates() {
    let config = EncoderConfig::new(44100, 1, 256);
    let mut encoder = EncoderState::new(config).unwrap();

    encoder.analyze_block(&[0.0; 256]).unwrap();
    assert_eq!(encoder.pending_window_ctrl(), WindowCtrl::INITIAL);

    let mut block = [0.0f32; 256];
    block[0] = 1.0;
    encoder.analyze_block(&block).unwrap();

    let ctrl = encoder.pending_window_ctrl();
    assert!(ctrl.is_decimated());
    assert_eq!(ctrl.decimation(), 0b101);
    assert_eq!(ctrl.pattern(256).sizes(), vec![64, 64, 128]);
    assert_eq!(ctrl.pattern(256).transient_index(), 1);
}

#[test]
fn test_window_code_applies_one_block_later() {
    let config = EncoderConfig::new(44100, 1, 256);
    let mut encoder = EncoderState::new(config).unwrap();

    let mut block = [0.0f32; 256];
    block[0] = 1.0;
    encoder.analyze_block(&block).unwrap();
    let decided = encoder.pending_window_ctrl();
    assert_eq!(encoder.window_ctrl(), WindowCtrl::INITIAL);

    encoder.analyze_block(&[0.0; 256]).unwrap();
    assert_eq!(encoder.window_ctrl(), decided);
}

#[test]
fn test_silent_block_has_zero_complexity() {
    let config = EncoderConfig::new(44100, 2, 256);
    let mut encoder = EncoderState::new(config).unwrap();
    let complexity = encoder.analyze_block(&[0.0; 512]).unwrap();
    assert_eq!(complexity, 0.0);
    assert_eq!(encoder.usable_coefficients(), 0);
}

#[test]
fn test_mid_side_is_normalized() {
    let mut block = vec![1.0, 0.5, 0.25, 0.25, 0.5, -0.25];
    mid_side(&mut block, 3);
    assert_eq!(block, vec![0.625, 0.5, 0.0, 0.375, 0.0, 0.25]);
}
