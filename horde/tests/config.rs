use horde::{
    Model,
    bson::Document,
    config::{Settings, bind_database_from_env},
};
use std::env;

#[derive(Debug, Model)]
struct Configured(Document);

#[derive(Debug, Model)]
struct Defaulted(Document);

#[tokio::test]
async fn settings_come_from_the_environment() {
    let missing = Settings::from_env_var("HORDE_CONFIG_TEST_MISSING");
    assert_eq!(missing.uri, None);
    assert_eq!(missing.connect_options(), None);
    assert!(missing.connect().await.unwrap().is_none());

    let bound = bind_database_from_env::<Configured>("HORDE_CONFIG_TEST_MISSING", false)
        .await
        .unwrap();
    assert!(bound.is_none());
    assert!(Configured::get_collection().is_err());

    // SAFETY: the only test of this binary, nothing reads the environment concurrently.
    unsafe {
        env::set_var("HORDE_CONFIG_TEST_URI", "memory://localhost/settings");
    }

    let bound = bind_database_from_env::<Configured>("HORDE_CONFIG_TEST_URI", true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bound.name(), "settings");
    assert_eq!(
        Configured::get_collection().unwrap().namespace(),
        "settings.configured"
    );

    let settings = Settings::from_env_var("HORDE_CONFIG_TEST_URI");
    assert_eq!(settings.uri.as_deref(), Some("memory://localhost/settings"));

    settings.connect().await.unwrap().unwrap();
    assert_eq!(Defaulted::get_database().unwrap().name(), "settings");
}
