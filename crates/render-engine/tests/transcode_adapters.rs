mod common;

use admock_common::error::AdmockError;
use admock_render_engine::transcode::{transcode_to_container, TranscodeSettings};
use common::{encoded, FakeLoader, Faults, Shape};

const RECORDING: &[u8] = b"webm-bytes";

fn expected_success_calls() -> Vec<String> {
    vec![
        "load".to_string(),
        format!("write input.webm ({} bytes)", RECORDING.len()),
        "run -i input.webm -c:v libx264 -preset medium -crf 23 -c:a aac -b:a 128k \
         -pix_fmt yuv420p -movflags +faststart output.mp4"
            .to_string(),
        "read output.mp4".to_string(),
        "delete input.webm".to_string(),
        "delete output.mp4".to_string(),
    ]
}

#[tokio::test]
async fn test_both_shapes_make_identical_calls() {
    for shape in [Shape::FileApi, Shape::LegacyFs] {
        let loader = FakeLoader::new(shape);
        assert_eq!(loader.loads(), 0);

        let out = transcode_to_container(&loader, RECORDING, &TranscodeSettings::default())
            .await
            .unwrap();

        assert_eq!(out, encoded(RECORDING), "{shape:?}");
        assert_eq!(loader.loads(), 1);
        assert_eq!(loader.calls(), expected_success_calls(), "{shape:?}");
    }
}

#[tokio::test]
async fn test_nonzero_exit_is_transcode_error_and_cleans_up() {
    for shape in [Shape::FileApi, Shape::LegacyFs] {
        let faults = Faults {
            nonzero_exit: true,
            ..Faults::default()
        };
        let loader = FakeLoader::with_faults(shape, faults);

        let err = transcode_to_container(&loader, RECORDING, &TranscodeSettings::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AdmockError::Transcode { .. }), "{shape:?}: {err}");
        let calls = loader.calls();
        assert!(!calls.contains(&"read output.mp4".to_string()));
        assert_eq!(
            calls[calls.len() - 2..],
            ["delete input.webm".to_string(), "delete output.mp4".to_string()]
        );
    }
}

#[tokio::test]
async fn test_load_failure_still_cleans_up() {
    for shape in [Shape::FileApi, Shape::LegacyFs] {
        let faults = Faults {
            fail_load: true,
            ..Faults::default()
        };
        let loader = FakeLoader::with_faults(shape, faults);

        let err = transcode_to_container(&loader, RECORDING, &TranscodeSettings::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AdmockError::Transcode { .. }));
        assert_eq!(
            loader.calls(),
            vec!["load", "delete input.webm", "delete output.mp4"]
        );
    }
}

#[tokio::test]
async fn test_module_fetch_failure_is_transcode_error() {
    let faults = Faults {
        fail_module: true,
        ..Faults::default()
    };
    let loader = FakeLoader::with_faults(Shape::FileApi, faults);

    let err = transcode_to_container(&loader, RECORDING, &TranscodeSettings::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AdmockError::Transcode { .. }));
    assert!(loader.calls().is_empty());
}

#[tokio::test]
async fn test_legacy_run_without_callback_fails() {
    let faults = Faults {
        drop_callback: true,
        ..Faults::default()
    };
    let loader = FakeLoader::with_faults(Shape::LegacyFs, faults);

    let err = transcode_to_container(&loader, RECORDING, &TranscodeSettings::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AdmockError::Transcode { .. }));
    assert!(err.to_string().contains("exit code"));
}

#[tokio::test]
async fn test_custom_quality_reaches_command() {
    let loader = FakeLoader::new(Shape::LegacyFs);
    let settings = TranscodeSettings {
        crf: 18,
        preset: "veryfast".into(),
    };
    transcode_to_container(&loader, RECORDING, &settings)
        .await
        .unwrap();

    let run = loader
        .calls()
        .into_iter()
        .find(|c| c.starts_with("run "))
        .unwrap();
    assert!(run.contains("-preset veryfast -crf 18"));
}
