mod common;

use crowd_mtl::data::loader::{ImageDataLoader, LoaderOptions};
use crowd_mtl::CrowdError;
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::write_dataset;

fn options(pre_load: bool) -> LoaderOptions {
    LoaderOptions { shuffle: false, pre_load, num_classes: 4, ..LoaderOptions::default() }
}

#[test]
fn pairs_files_in_name_order_and_preserves_counts() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[4.0, 10.0, 1.0]);
    let loader = ImageDataLoader::new(&ds.images, &ds.gt, options(true)).unwrap();
    assert_eq!(loader.num_samples(), 3);

    let mut rng = StdRng::seed_from_u64(0);
    let blobs: Vec<_> = loader.iter(&mut rng).map(|b| b.unwrap()).collect();
    let names: Vec<_> = blobs.iter().map(|b| b.fname.as_str()).collect();
    assert_eq!(names, ["IMG_1.png", "IMG_2.png", "IMG_3.png"]);
    for (blob, want) in blobs.iter().zip([4.0, 10.0, 1.0]) {
        assert!((blob.gt_count() - want).abs() < 1e-9);
        assert_eq!(blob.image.shape(), (8, 8));
        assert_eq!(blob.gt_density.shape(), (8, 8));
        assert_eq!(blob.gt_class_label.iter().sum::<f64>(), 1.0);
    }
}

#[test]
fn class_statistics_cover_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[0.0, 4.0, 8.0, 8.0]);
    let loader = ImageDataLoader::new(&ds.images, &ds.gt, options(true)).unwrap();

    let classes = loader.count_classes();
    assert_eq!(classes.bin, 2.0);
    assert_eq!(loader.class_histogram(), &[1, 0, 1, 2]);
    assert_eq!(loader.class_histogram().iter().sum::<usize>(), loader.num_samples());

    let mut rng = StdRng::seed_from_u64(0);
    let classes_seen: Vec<_> = loader.iter(&mut rng).map(|b| b.unwrap().gt_class).collect();
    assert_eq!(classes_seen, vec![0, 2, 3, 3]);
}

#[test]
fn lazy_loading_yields_the_same_samples() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[2.0, 5.0, 9.0, 3.0]);
    let eager = ImageDataLoader::new(&ds.images, &ds.gt, options(true)).unwrap();
    let lazy = ImageDataLoader::new(&ds.images, &ds.gt, options(false)).unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let a: Vec<_> = eager.iter(&mut rng).map(|b| b.unwrap()).collect();
    let b: Vec<_> = lazy.iter(&mut rng).map(|b| b.unwrap()).collect();
    assert_eq!(a, b);
    assert_eq!(eager.classifier_weights(), lazy.classifier_weights());
}

#[test]
fn downsampled_ground_truth_keeps_its_mass() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[6.0, 12.0]);
    let opts = LoaderOptions { gt_downsample: true, ..options(true) };
    let loader = ImageDataLoader::new(&ds.images, &ds.gt, opts).unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    for (blob, want) in loader.iter(&mut rng).map(|b| b.unwrap()).zip([6.0, 12.0]) {
        assert_eq!(blob.gt_density.shape(), (2, 2));
        assert!((blob.gt_count() - want).abs() < 1e-9);
    }
}

#[test]
fn missing_ground_truth_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[1.0, 2.0]);
    std::fs::remove_file(ds.gt.join("IMG_2.csv")).unwrap();
    std::fs::write(ds.gt.join("orphan.csv"), "0,0\n0,0\n").unwrap();

    match ImageDataLoader::new(&ds.images, &ds.gt, options(true)) {
        Err(CrowdError::Mismatch { report, .. }) => {
            assert_eq!(report.images_without_gt, vec!["IMG_2.png".to_string()]);
            assert_eq!(report.gt_without_images, vec!["orphan.csv".to_string()]);
        }
        other => panic!("expected mismatch, got {:?}", other.err()),
    }
}

#[test]
fn empty_image_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[]);
    assert!(matches!(
        ImageDataLoader::new(&ds.images, &ds.gt, options(true)),
        Err(CrowdError::EmptyDataset(_))
    ));
}

#[test]
fn same_seed_same_shuffle_order() {
    let dir = tempfile::tempdir().unwrap();
    let ds = write_dataset(dir.path(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let opts = LoaderOptions { shuffle: true, ..options(true) };
    let loader = ImageDataLoader::new(&ds.images, &ds.gt, opts).unwrap();

    let mut a = StdRng::seed_from_u64(7);
    let mut b = StdRng::seed_from_u64(7);
    for _ in 0..3 {
        assert_eq!(loader.iter(&mut a).file_order(), loader.iter(&mut b).file_order());
    }
    let mut sorted = loader.iter(&mut a).file_order();
    sorted.sort();
    assert_eq!(sorted.len(), 6);
    sorted.dedup();
    assert_eq!(sorted.len(), 6);
}
