use mixkit::control::mock::MockBackend;
use mixkit::control::{ControlInfo, ControlSession, ElemId, OpenMode};
use mixkit::mixer::{self, Mixer, MixerConfig, MixerDefinition, RegistryConfig, Streams};
use mixkit::provider::{NoModuleLoader, ProviderRegistry};
use std::time::Duration;

fn backend() -> MockBackend {
    let backend = MockBackend::new();
    let card = backend.add_card("hw:0");
    card.add_control(ElemId::mixer(1, "Master Playback Volume"), ControlInfo::integer(2, 0, 31));
    card.add_control(ElemId::mixer(2, "PCM Playback Volume"), ControlInfo::integer(2, 0, 255));
    backend
}

fn open_mixer(backend: &MockBackend) -> Mixer {
    let registry = ProviderRegistry::with_loader(RegistryConfig::default(), Box::new(NoModuleLoader));
    let config = MixerConfig::new()
        .with_mixer("default", MixerDefinition::new("basic").with_param("device", "hw:0"));
    Mixer::open(&registry, backend, &config, "default", Streams::none(), OpenMode::nonblocking())
        .unwrap()
}

#[tokio::test]
async fn test_pump_times_out_without_activity() {
    let backend = backend();
    let mut mixer = open_mixer(&backend);
    assert_eq!(mixer::pump(&mut mixer, 10).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pump_wakes_on_hardware_change() {
    let backend = backend();
    let card = backend.device("hw:0").unwrap();
    let mut mixer = open_mixer(&backend);

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        card.set_value(2, vec![128, 128]);
    });

    let handled = mixer::pump(&mut mixer, 5000).await.unwrap();
    writer.await.unwrap();
    assert_eq!(handled, 1);
}

#[tokio::test]
async fn test_wait_async_is_detached_from_mixer() {
    let backend = backend();
    let card = backend.device("hw:0").unwrap();
    let mixer = open_mixer(&backend);

    let waiting = tokio::spawn(mixer.wait_async(5000));
    card.set_value(1, vec![3, 3]);
    assert_eq!(waiting.await.unwrap().unwrap(), 1);
    mixer.close().unwrap();
}

#[tokio::test]
async fn test_pump_session_uses_stored_callbacks() {
    let backend = backend();
    let card = backend.device("hw:0").unwrap();
    let mut session = ControlSession::open(&backend, "hw:0", OpenMode::nonblocking()).unwrap();
    session.subscribe_events(true).unwrap();
    session.load().unwrap();

    card.set_value(1, vec![9, 9]);
    card.set_value(2, vec![9, 9]);
    assert_eq!(mixer::pump_session(&mut session, 1000).await.unwrap(), 2);
    assert_eq!(mixer::pump_session(&mut session, 0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pump_session_rejects_unpollable_transport() {
    let backend = MockBackend::new();
    let card = backend.add_card("hw:0");
    let mut session = ControlSession::open(&backend, "hw:0", OpenMode::nonblocking()).unwrap();
    card.set_unpollable(true);
    assert!(matches!(
        mixer::pump_session(&mut session, -1).await,
        Err(mixkit::Error::InvalidArgument(_))
    ));
}
