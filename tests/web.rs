//! Test suite for the Web and headless browsers.

#![cfg(target_arch = "wasm32")]

extern crate wasm_bindgen_test;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use tsne_walkthrough::{GaussianClusters, Tsne, TsneConfig};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn steps_through_a_small_run() {
    let data = GaussianClusters {
        clusters: 2,
        points_per_cluster: 6,
        ..GaussianClusters::default()
    }
    .generate()
    .unwrap();
    let flat: Vec<f64> = data.points.iter().copied().collect();

    let mut tsne = match Tsne::new(&flat, 3, &data.labels, small_config()) {
        Ok(tsne) => tsne,
        Err(_) => panic!("valid input was rejected"),
    };
    assert_eq!(tsne.phase(), "INIT");
    assert_eq!(tsne.step().as_deref(), Some("INIT"));
    assert_eq!(tsne.phase(), "COMPUTE_DISTANCES");

    tsne.run();
    assert!(tsne.is_complete());
    assert_eq!(tsne.step(), None);
    assert_eq!(tsne.embedding().len(), 12 * 2);
    assert!(tsne.cost().is_some());
    assert!(tsne.snapshot_count() > 0);
    assert!(tsne.snapshot(tsne.snapshot_count()).is_err());
}

#[wasm_bindgen_test]
fn rejects_mismatched_labels() {
    assert!(Tsne::new(&[0.0; 6], 3, &[0], JsValue::UNDEFINED).is_err());
}

fn small_config() -> JsValue {
    let config = TsneConfig::default()
        .with_perplexity(2.0)
        .with_max_iterations(20)
        .with_seed(1);
    serde_wasm_bindgen::to_value(&config).unwrap()
}
