//! End-to-end tests: CSV dataset → trained service → predictions.

use approx::assert_relative_eq;
use orientation::data::{
    FeatureValue, LabeledStudent, Sector, SqliteStudentStore, StudentRecord, StudentStore,
    UNKNOWN_SECTOR,
};
use orientation::model::{ForestConfig, TrainingConfig};
use orientation::{
    ArtifactKind, DEFAULT_FALLBACK_SECTOR, OrientationService, ServiceConfig, StudentIntake,
    TrainingState,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn profile(i: usize, technical: bool) -> StudentRecord {
    let jitter = (i % 4) as f64 * 0.5;
    let pairs: Vec<(&str, FeatureValue)> = if technical {
        vec![
            ("Serie_Bac", "S".into()),
            ("Matieres_Preferees", "Mathematiques".into()),
            ("Note_Maths", (15.0 + jitter).into()),
            ("Note_Physique_Chimie", (14.0 + jitter).into()),
            ("Note_SVT", 11.0.into()),
            ("Competences_Techniques", "Programmation".into()),
            ("Secteur_Desire", "Informatique".into()),
            ("Personnalite", "Analytique".into()),
        ]
    } else {
        vec![
            ("Serie_Bac", "D".into()),
            ("Matieres_Preferees", "Biologie".into()),
            ("Note_Maths", (8.0 + jitter).into()),
            ("Note_Physique_Chimie", (10.0 + jitter).into()),
            ("Note_SVT", 16.0.into()),
            ("Competences_Techniques", "Soins".into()),
            ("Secteur_Desire", "Sante".into()),
            ("Personnalite", "Empathique".into()),
        ]
    };

    let mut record = StudentRecord::from_values(pairs).unwrap();
    record.sexe = Some(if i % 2 == 0 { "Feminin" } else { "Masculin" }.to_string());
    record.age_bac = Some(17.0 + (i % 3) as f64);
    record.note_philo = Some(10.0 + jitter);
    record.points_bac = Some(240.0 + 10.0 * jitter);
    record.etablissement = Some(format!("Lycee {}", i % 3));
    record
}

/// Write a labeled dataset: 25 technical, 25 health, plus 2 health rows without a target.
fn write_dataset(path: &Path) -> usize {
    let store = SqliteStudentStore::in_memory().unwrap();
    for i in 0..25 {
        store
            .insert(&profile(i, true).label(Sector::from("Informatique")))
            .unwrap();
        store
            .insert(&profile(i, false).label(Sector::from("Sante")))
            .unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let rows = store.export_csv(file).unwrap();

    // rows whose target cell is empty
    let mut text = std::fs::read_to_string(path).unwrap();
    for i in 0..2 {
        let mut record = profile(i, false);
        record.etablissement = Some("Lycee Hors Liste".to_string());
        let line = csv_line(&record.label(Sector::from("Sante")));
        text.push_str(&line[..line.len() - "Sante".len()]);
        text.push('\n');
    }
    std::fs::write(path, text).unwrap();
    rows + 2
}

fn csv_line(student: &LabeledStudent) -> String {
    let store = SqliteStudentStore::in_memory().unwrap();
    store.insert(student).unwrap();
    let mut out = Vec::new();
    store.export_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    text.lines().nth(1).unwrap().to_string()
}

fn config(dataset: &Path) -> ServiceConfig {
    ServiceConfig {
        dataset_path: dataset.to_path_buf(),
        training: TrainingConfig {
            forest: ForestConfig {
                n_trees: 30,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

fn trained_service() -> (tempfile::TempDir, OrientationService) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("students.csv");
    write_dataset(&dataset);
    let service = OrientationService::new(config(&dataset)).unwrap();
    (dir, service)
}

#[test]
fn test_technical_profile_is_informatique() {
    let (_dir, service) = trained_service();

    let mut record = profile(3, true);
    record.note_maths = Some(16.0);
    record.serie_bac = Some("S".to_string());

    assert_eq!(service.predict_orientation(&record).as_str(), "Informatique");
    assert_eq!(service.artifact_kind(), ArtifactKind::Fitted);
    assert_eq!(service.training_state(), TrainingState::Trained);
}

#[test]
fn test_complete_records_get_a_model_label() {
    let (_dir, service) = trained_service();
    let pipeline_classes = {
        service.predict_orientation(&profile(0, false));
        service.pipeline().unwrap().classes().to_vec()
    };

    for i in 0..8 {
        for technical in [true, false] {
            let sector = service.predict_orientation(&profile(i, technical));
            assert_ne!(sector.as_str(), DEFAULT_FALLBACK_SECTOR);
            assert!(pipeline_classes.iter().any(|c| c == sector.as_str()));
        }
    }
    assert_eq!(service.predict_orientation(&profile(1, false)).as_str(), "Sante");
}

#[test]
fn test_unseen_and_missing_categories_still_predict() {
    let (_dir, service) = trained_service();

    let mut unseen = profile(2, false);
    unseen.serie_bac = Some("F3".to_string());
    unseen.religion = Some("Autre".to_string());
    assert!(service.try_predict(&unseen).is_ok());

    let mut bare = profile(2, true);
    bare.sexe = None;
    bare.serie_bac = None;
    bare.matieres_preferees = None;
    bare.personnalite = None;
    bare.competences_techniques = None;
    bare.secteur_desire = None;
    bare.etablissement = None;
    assert!(service.try_predict(&bare).is_ok());
    assert!(service.try_predict(&StudentRecord::default()).is_ok());
}

#[test]
fn test_prediction_is_idempotent() {
    let (_dir, service) = trained_service();
    let record = profile(5, true);
    let first = service.predict_orientation(&record);
    for _ in 0..5 {
        assert_eq!(service.predict_orientation(&record), first);
    }
}

#[test]
fn test_feature_importance_once_fitted() {
    let (_dir, service) = trained_service();
    assert!(service.get_feature_importance().is_empty());

    service.predict_orientation(&profile(0, true));
    let importance = service.get_feature_importance();
    assert_eq!(importance.len(), 28);
    assert_relative_eq!(importance.total(), 1.0, epsilon = 1e-9);
    assert!(importance.iter().all(|(_, w)| w >= 0.0));
}

#[test]
fn test_missing_targets_keep_their_rows() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("students.csv");
    let rows = write_dataset(&dataset);
    let service = OrientationService::new(config(&dataset)).unwrap();
    service.retrain().unwrap();

    let pipeline = service.pipeline().unwrap();
    assert!(pipeline.classes().iter().any(|c| c == UNKNOWN_SECTOR));
    let evaluated = pipeline.report().map_or(0, |r| r.support);
    assert_eq!(pipeline.n_train() + evaluated, rows);
}

#[test]
fn test_fallback_is_not_a_trained_class() {
    let (_dir, service) = trained_service();
    service.warm_up();
    let pipeline = service.pipeline().unwrap();

    assert_ne!(service.fallback().as_str(), UNKNOWN_SECTOR);
    assert!(pipeline.classes().iter().any(|c| c == UNKNOWN_SECTOR));
    assert!(pipeline.classes().iter().all(|c| c != service.fallback().as_str()));

    for i in 0..6 {
        for technical in [true, false] {
            let sector = service.predict_orientation(&profile(i, technical));
            assert_ne!(&sector, service.fallback());
        }
    }
    let mut unlabeled = profile(0, false);
    unlabeled.etablissement = Some("Lycee Hors Liste".to_string());
    assert_ne!(&service.predict_orientation(&unlabeled), service.fallback());
}

#[test]
fn test_predict_values_with_unknown_key_falls_back() {
    let (_dir, service) = trained_service();
    let sector = service.predict_values([
        ("Note_Maths", FeatureValue::from(16.0)),
        ("Shoe_Size", FeatureValue::from(42.0)),
    ]);
    assert_eq!(sector.as_str(), DEFAULT_FALLBACK_SECTOR);

    let sector = service.predict_values([
        ("Note_Maths", FeatureValue::from(16.0)),
        ("Serie_Bac", FeatureValue::from("S")),
        ("Competences_Techniques", FeatureValue::from("Programmation")),
        ("Secteur_Desire", FeatureValue::from("Informatique")),
    ]);
    assert_ne!(sector.as_str(), DEFAULT_FALLBACK_SECTOR);
}

#[test]
fn test_artifact_is_persisted_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("students.csv");
    write_dataset(&dataset);
    let artifact = dir.path().join("models").join("orientation.json");

    let trained = {
        let config = ServiceConfig {
            artifact_path: Some(artifact.clone()),
            persist_artifact: true,
            ..config(&dataset)
        };
        let service = OrientationService::new(config).unwrap();
        service.predict_orientation(&profile(0, true));
        service.pipeline().unwrap()
    };
    assert!(artifact.is_file());

    // dataset gone: the artifact alone must be enough
    std::fs::remove_file(&dataset).unwrap();
    let config = ServiceConfig {
        artifact_path: Some(artifact),
        ..config(&dataset)
    };
    let service = OrientationService::new(config).unwrap();
    let record = profile(4, false);
    assert_eq!(
        service.predict_orientation(&record).as_str(),
        trained.predict_one(&record, service.schema()).unwrap()
    );
    assert_eq!(service.training_state(), TrainingState::Untrained);
    assert_eq!(service.pipeline().unwrap().trained_at(), trained.trained_at());
}

#[test]
fn test_concurrent_first_predictions_train_once() {
    let (_dir, service) = trained_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.predict_orientation(&profile(i, i % 2 == 0)))
        })
        .collect();
    let sectors: Vec<Sector> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(sectors.iter().all(|s| s.as_str() != DEFAULT_FALLBACK_SECTOR));
    let first = service.pipeline().unwrap();
    service.predict_orientation(&profile(9, true));
    assert!(Arc::ptr_eq(&first, &service.pipeline().unwrap()));
}

#[test]
fn test_retrain_swaps_the_model() {
    let (_dir, service) = trained_service();
    service.predict_orientation(&profile(0, true));
    let before = service.pipeline().unwrap();

    service.retrain().unwrap();
    let after = service.pipeline().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    // same data and seed
    let record = profile(6, false);
    assert_eq!(
        before.predict_one(&record, service.schema()).unwrap(),
        after.predict_one(&record, service.schema()).unwrap()
    );
}

#[test]
fn test_intake_enrolls_with_prediction() {
    let (_dir, service) = trained_service();
    let intake = StudentIntake::new(Arc::new(service), SqliteStudentStore::in_memory().unwrap());

    let student = intake.enroll(profile(2, true)).unwrap();
    assert_eq!(student.sector.as_str(), "Informatique");
    let stored = intake.student(student.id.unwrap()).unwrap();
    assert_eq!(stored.sector, student.sector);
}
