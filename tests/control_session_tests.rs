use mixkit::control::mock::{MockBackend, MockDevice};
use mixkit::control::{
    ControlElement, ControlEvent, ControlEventHandler, ControlInfo, ControlSession, ElemId,
    EventMask, OpenMode,
};
use mixkit::{Error, Result};
use std::sync::{Arc, Mutex};

fn card() -> (MockBackend, MockDevice) {
    let backend = MockBackend::new();
    let card = backend.add_card("hw:0");
    card.add_control(ElemId::mixer(10, "Master Playback Volume"), ControlInfo::integer(2, 0, 31));
    card.add_control(ElemId::mixer(20, "PCM Playback Volume"), ControlInfo::integer(2, 0, 255));
    card.add_control(ElemId::mixer(30, "Capture Switch"), ControlInfo::boolean(2));
    (backend, card)
}

fn open(backend: &MockBackend) -> ControlSession {
    let mut session = ControlSession::open(backend, "hw:0", OpenMode::nonblocking()).unwrap();
    session.subscribe_events(true).unwrap();
    session.load().unwrap();
    session
}

fn numids(session: &ControlSession) -> Vec<u32> {
    session.iter().map(|e| e.numid()).collect()
}

#[derive(Default)]
struct Recorder {
    seen: Vec<(String, u32)>,
}

impl ControlEventHandler for Recorder {
    fn session_event(&mut self, _session: &ControlSession, mask: EventMask, elem: &ControlElement) -> Result<()> {
        self.seen.push((mask.to_string(), elem.numid()));
        Ok(())
    }

    fn element_event(&mut self, session: &ControlSession, elem: &ControlElement, mask: EventMask) -> Result<()> {
        // the element is still linked while its removal is reported
        assert!(session.find_numid(elem.numid()).is_some());
        self.seen.push((mask.to_string(), elem.numid()));
        Ok(())
    }
}

#[test]
fn test_open_unknown_endpoint_is_transport_error() {
    let (backend, _card) = card();
    let err = ControlSession::open(&backend, "hw:7", OpenMode::default()).err().unwrap();
    assert!(matches!(err, Error::Transport(_)));
}

#[test]
fn test_hotplug_add_is_inserted_in_order() {
    let (backend, card) = card();
    let mut session = open(&backend);
    card.add_control(ElemId::mixer(40, "Headphone Playback Volume"), ControlInfo::integer(2, 0, 31));

    assert_eq!(session.handle_events().unwrap(), 1);
    assert_eq!(numids(&session), vec![10, 40, 20, 30]);
}

#[test]
fn test_load_twice_is_rejected() {
    let (backend, _card) = card();
    let mut session = open(&backend);
    assert!(matches!(session.load(), Err(Error::InvalidArgument(_))));
    assert_eq!(session.count(), 3);
}

#[test]
fn test_handler_sees_add_value_and_remove() {
    let (backend, card) = card();
    let mut session = ControlSession::open(&backend, "hw:0", OpenMode::nonblocking()).unwrap();
    session.subscribe_events(true).unwrap();

    let mut recorder = Recorder::default();
    session.load_with(&mut recorder).unwrap();
    card.set_value(20, vec![1, 1]);
    card.remove_control(30);
    assert_eq!(session.handle_events_with(&mut recorder).unwrap(), 2);

    assert_eq!(
        recorder.seen,
        vec![
            ("ADD".to_string(), 10),
            ("ADD".to_string(), 20),
            ("ADD".to_string(), 30),
            ("VALUE".to_string(), 20),
            ("REMOVE".to_string(), 30),
        ]
    );
    assert_eq!(numids(&session), vec![10, 20]);
}

#[test]
fn test_value_and_info_reach_element_callback() {
    let (backend, card) = card();
    let mut session = open(&backend);
    let masks = Arc::new(Mutex::new(Vec::new()));
    let sink = masks.clone();
    session
        .element_mut(&ElemId::mixer(10, "Master Playback Volume"))
        .unwrap()
        .set_callback(move |_, mask| {
            sink.lock().unwrap().push(mask);
            Ok(())
        });

    card.set_value(10, vec![3, 3]);
    card.set_info(10, ControlInfo::integer(2, 0, 63));
    card.push_event(ControlEvent::new(
        ElemId::mixer(10, "Master Playback Volume"),
        EventMask::VALUE | EventMask::INFO,
    ));
    session.handle_events().unwrap();

    let masks = masks.lock().unwrap();
    assert_eq!(masks.len(), 3);
    assert!(masks[0].is_value() && !masks[0].is_info());
    assert!(masks[1].is_info());
    assert!(masks[2].is_value() && masks[2].is_info());
}

#[test]
fn test_callback_error_stops_processing() {
    let (backend, card) = card();
    let mut session = open(&backend);
    session
        .element_mut(&ElemId::mixer(20, "PCM Playback Volume"))
        .unwrap()
        .set_callback(|_, _| Err(Error::invalid("rejected")));

    card.set_value(20, vec![9, 9]);
    card.set_value(10, vec![9, 9]);
    assert!(matches!(session.handle_events(), Err(Error::InvalidArgument(_))));
    // the second event is still queued
    assert_eq!(session.handle_events().unwrap(), 1);
}

#[test]
fn test_write_then_read_back() {
    let (backend, card) = card();
    let session = open(&backend);
    let id = ElemId::mixer(20, "PCM Playback Volume");
    assert!(session.write_value(&id, &[100, 200]).unwrap());
    assert!(!session.write_value(&id, &[100, 200]).unwrap());
    assert_eq!(session.read_value(&id).unwrap(), vec![100, 200]);
    assert_eq!(card.values(20), Some(vec![100, 200]));
    assert!(session.write_value(&id, &[1]).is_err());
}

#[test]
fn test_wait_times_out_then_sees_event() {
    let (backend, card) = card();
    let mut session = open(&backend);
    assert_eq!(session.wait(0).unwrap(), 0);

    card.set_value(10, vec![1, 2]);
    assert_eq!(session.wait(1000).unwrap(), 1);
    assert_eq!(session.handle_events().unwrap(), 1);
    assert_eq!(session.wait(0).unwrap(), 0);
}

#[test]
fn test_wait_without_descriptors_is_rejected() {
    let (backend, card) = card();
    let session = open(&backend);
    card.set_unpollable(true);
    assert!(session.poll_descriptors().unwrap().is_empty());
    assert!(matches!(session.wait(-1), Err(Error::InvalidArgument(_))));
    assert!(matches!(session.wait(0), Err(Error::InvalidArgument(_))));

    card.set_unpollable(false);
    assert_eq!(session.wait(0).unwrap(), 0);
}

#[test]
fn test_unsubscribed_session_gets_no_events() {
    let (backend, card) = card();
    let mut session = open(&backend);
    session.subscribe_events(false).unwrap();
    card.set_value(10, vec![5, 5]);
    assert_eq!(session.handle_events().unwrap(), 0);
}

#[test]
fn test_close_detaches_from_card() {
    let (backend, card) = card();
    let session = open(&backend);
    let second = open(&backend);
    assert_eq!(card.connections(), 2);
    session.close().unwrap();
    second.close().unwrap();
    assert_eq!(card.connections(), 0);
    assert_eq!(backend.open_count(), 2);
}
