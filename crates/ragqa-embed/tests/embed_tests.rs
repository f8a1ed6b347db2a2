use candle_core::{Device, Tensor, DType};
use ragqa_embed::{cls_pool, masked_mean_l2, FakeEncoder};
use ragqa_core::traits::QueryEncoder;

#[test]
fn masked_mean_l2_basic() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; second token is masked out.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,  // token 0
                                 5.0, 6.0, 7.0, 8.0],    // token 1
                               (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 0u32], (1, 2), &dev).unwrap()
        .to_dtype(DType::F32).unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let v = &v[0];
    let norm: f32 = (1.0f32*1.0 + 2.0*2.0 + 3.0*3.0 + 4.0*4.0).sqrt();
    let expected = [1.0/norm, 2.0/norm, 3.0/norm, 4.0/norm];
    for (a,b) in v.iter().cloned().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={} b={}", a, b);
    }
}

#[test]
fn cls_pool_takes_first_token() {
    let dev = Device::Cpu;
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0,
                                 7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
                               (2, 3, 2), &dev).unwrap();
    let out: Vec<Vec<f32>> = cls_pool(&h).unwrap().to_vec2().unwrap();
    assert_eq!(out, vec![vec![1.0, 2.0], vec![7.0, 8.0]]);
}

#[test]
fn fake_encoder_shapes_and_determinism() {
    let encoder = FakeEncoder::new(768);
    let texts = vec!["what is haleys comet?".to_string(), "what is haleys comet?".to_string(), "plot of hamlet".to_string()];
    let embs = encoder.encode_queries(&texts).expect("encode");
    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0].len(), 768, "embedding dim follows configuration");

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in embs[0].iter().zip(embs[1].iter()) { assert!((a - b).abs() <= 1e-6); }
    assert_ne!(embs[0], embs[2]);
}
