use mixkit::control::mock::MockBackend;
use mixkit::control::{ControlInfo, ElemId, OpenMode};
use mixkit::mixer::{self, channel_name, Direction, Mixer, MixerConfig, MixerDefinition, Streams};
use mixkit::provider::ProviderRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("mixkit - simple mixer demo");
    println!("==========================\n");

    let backend = MockBackend::new();
    let card = backend.add_card("hw:0");
    card.add_control(
        ElemId::mixer(1, "Master Playback Volume"),
        ControlInfo::integer(2, 0, 31).with_db(-4650, 0),
    );
    card.add_control(ElemId::mixer(2, "Master Playback Switch"), ControlInfo::boolean(2));
    card.add_control(ElemId::mixer(3, "PCM Playback Volume"), ControlInfo::integer(2, 0, 255));
    card.add_control(ElemId::mixer(4, "Capture Source"), ControlInfo::enumerated(1, ["Mic", "Line"]));
    card.add_control(ElemId::mixer(5, "Mic Boost Volume"), ControlInfo::integer(1, 0, 3));

    let config = MixerConfig::new()
        .with_mixer("default", MixerDefinition::new("basic").with_param("device", "hw:0"))
        .with_alias("card0", "default");

    let mut mixer = Mixer::open(
        ProviderRegistry::global(),
        &backend,
        &config,
        "card0",
        Streams::none(),
        OpenMode::nonblocking(),
    )?;

    mixer.set_callback(|mask, elem| {
        println!("  mixer event {} on {}", mask, elem);
        Ok(())
    });

    println!("Elements of '{}':", mixer.name());
    for elem in mixer.iter() {
        let r = mixer.elem_ref(elem);
        print!("  {:<16} caps={:#06x}", elem.to_string(), elem.caps().0);
        if r.has_volume(Direction::Playback) {
            let (min, max) = r.get_volume_range(Direction::Playback)?;
            print!(" volume {}..{} [{}={}]", min, max, channel_name(0), r.get_volume(Direction::Playback, 0)?);
        }
        if r.has_switch_exclusive(Direction::Capture) {
            print!(" source group {}", r.get_group(Direction::Capture)?);
        }
        println!();
    }

    println!("\nHardware changes Master volume and selects Line...");
    card.set_value(1, vec![20, 20]);
    card.set_value(4, vec![1]);
    let handled = mixer::pump(&mut mixer, 100).await?;
    println!("Handled {} control events", handled);

    let master = mixer::MixerElemId::new("Master", 0);
    if let Some(r) = mixer.elem(&master) {
        r.set_db_all(Direction::Playback, -1200, Default::default())?;
        println!("Master at {} (0.01 dB)", r.get_db(Direction::Playback, 0)?);
    }

    println!("\nHot-unplugging PCM Playback Volume...");
    card.remove_control(3);
    mixer::pump(&mut mixer, 100).await?;
    println!("{} elements left", mixer.count());

    mixer.close()?;
    println!("\nDemo complete.");
    Ok(())
}
