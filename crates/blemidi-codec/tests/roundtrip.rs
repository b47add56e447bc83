use blemidi_codec::{
    CodecError, Event, PacketReader, PacketWriter, ReaderConfig, TimedEvent, Timestamp,
    MIN_PACKET_CAPACITY, TIMESTAMP_MAX,
};
use bytes::Bytes;
use proptest::prelude::*;

/// Encode `events` with the given capacity and return every packet produced.
fn encode(capacity: usize, events: &[TimedEvent]) -> Vec<Bytes> {
    let mut writer = PacketWriter::new(capacity).unwrap();
    let mut packets = Vec::new();
    for timed in events {
        writer
            .push_event(&timed.event, timed.timestamp, |packet| packets.push(packet))
            .unwrap();
    }
    packets.extend(writer.flush());
    packets
}

/// Decode packets in order with `decode_one`, checking progress on every call.
fn decode(reader: &mut PacketReader, packets: &[Bytes]) -> Vec<TimedEvent> {
    let mut events = Vec::new();
    for packet in packets {
        reader.reset();
        let mut offset = 0;
        while offset < packet.len() {
            let decoded = reader.decode_one(&packet[offset..]);
            assert!(decoded.consumed > 0, "no progress at offset {offset}");
            assert_eq!(decoded.error, None, "at offset {offset}");
            offset += decoded.consumed;
            events.extend(decoded.event);
        }
        assert_eq!(offset, packet.len());
    }
    events
}

/// NoteOn with velocity 0 reads back as NoteOff.
fn canonical(timed: &TimedEvent) -> TimedEvent {
    match timed.event {
        Event::NoteOn {
            channel,
            note,
            velocity: 0,
        } => TimedEvent::new(timed.timestamp, Event::note_off(channel, note, 0)),
        _ => timed.clone(),
    }
}

fn at(millis: u16, event: Event) -> TimedEvent {
    TimedEvent::new(Timestamp::new(millis), event)
}

#[test]
fn channel_messages_survive_every_capacity() {
    let events = vec![
        at(100, Event::pitch_bend(8, 0)),
        at(100, Event::control_change(8, 74, 63)),
        at(100, Event::note_on(8, 62, 14)),
        at(100, Event::ChannelPressure { channel: 8, value: 113 }),
        at(100, Event::control_change(8, 74, 67)),
        at(100, Event::pitch_bend(8, -2)),
        at(100, Event::pitch_bend(8, -3)),
        at(100, Event::pitch_bend(8, -4)),
        at(100, Event::note_off(8, 62, 0)),
    ];

    for capacity in MIN_PACKET_CAPACITY..=32 {
        let packets = encode(capacity, &events);
        assert!(packets.iter().all(|p| p.len() <= capacity));
        let decoded = decode(&mut PacketReader::new(), &packets);
        assert_eq!(decoded, events, "capacity {capacity}");
    }
}

#[test]
fn sysex_messages_survive_every_capacity() {
    let payloads: [&[u8]; 5] = [
        &[0xF0, 0x01, 0x02, 0x03, 0xF7],
        &[
            0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0xF7,
        ],
        &[
            0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
            0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0xF7,
        ],
        &[0xF0, 0x01, 0x02, 0x03, 0xF7],
        &[0xF0, 0x06, 0x07, 0x08, 0x09, 0x0A, 0xF7],
    ];
    let events: Vec<_> = payloads
        .iter()
        .map(|p| at(3000, Event::sysex(Bytes::copy_from_slice(p))))
        .collect();

    for capacity in MIN_PACKET_CAPACITY..=40 {
        let packets = encode(capacity, &events);
        let decoded = decode(&mut PacketReader::new(), &packets);
        assert_eq!(decoded, events, "capacity {capacity}");
    }
}

#[test]
fn sysex_written_in_fragments_reads_back_whole() {
    // Deterministic 7-bit noise between F0 and F7.
    let mut seed: u32 = 0x2545_F491;
    let mut sysex = vec![0xF0];
    sysex.extend((0..1022).map(|_| {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (seed >> 16) as u8 & 0x7F
    }));
    sysex.push(0xF7);
    assert_eq!(sysex.len(), 1024);

    let fragments: Vec<_> = sysex
        .chunks(256)
        .map(|chunk| at(42, Event::sysex(Bytes::copy_from_slice(chunk))))
        .collect();

    for capacity in [5, 20, 23, 100, 185, 256, 512] {
        let packets = encode(capacity, &fragments);
        let decoded = decode(&mut PacketReader::new(), &packets);
        assert_eq!(decoded, vec![at(42, Event::sysex(sysex.clone()))]);
    }
}

#[test]
fn reader_limit_rejects_oversized_sysex() {
    let mut sysex = vec![0xF0];
    sysex.extend(std::iter::repeat(0x11).take(100));
    sysex.push(0xF7);
    let packets = encode(512, &[at(0, Event::sysex(sysex))]);

    let mut reader = PacketReader::with_config(ReaderConfig { max_sysex_len: 64 });
    let results: Vec<_> = reader.packet(&packets[0]).collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(CodecError::SysexTooLarge { max: 64, .. })
    ));
}

#[test]
fn events_after_oversized_sysex_survive() {
    let mut sysex = vec![0xF0];
    sysex.extend(std::iter::repeat(0x22).take(300));
    sysex.push(0xF7);
    let events = vec![
        at(10, Event::note_on(1, 60, 90)),
        at(11, Event::sysex(sysex)),
        at(12, Event::note_off(1, 60, 0)),
        at(12, Event::Clock),
    ];

    for capacity in [5, 20, 64, 512] {
        let packets = encode(capacity, &events);
        let mut reader = PacketReader::with_config(ReaderConfig { max_sysex_len: 128 });
        let mut decoded = Vec::new();
        let mut errors = 0;
        for packet in &packets {
            for result in reader.packet(packet) {
                match result {
                    Ok(timed) => decoded.push(timed),
                    Err(CodecError::SysexTooLarge { max: 128, .. }) => errors += 1,
                    Err(err) => panic!("unexpected error {err:?}"),
                }
            }
        }
        assert_eq!(errors, 1, "capacity {capacity}");
        assert_eq!(
            decoded,
            vec![
                at(10, Event::note_on(1, 60, 90)),
                at(12, Event::note_off(1, 60, 0)),
                at(12, Event::Clock),
            ],
            "capacity {capacity}"
        );
    }
}

#[test]
fn realtime_between_sysex_fragments_reads_back() {
    let events = vec![
        at(10, Event::sysex((0xF0..=0xF0).chain(0x01..=0x10).collect::<Vec<u8>>())),
        at(11, Event::Clock),
        at(12, Event::sysex((0x11..=0x20).collect::<Vec<u8>>())),
        at(12, Event::Start),
        at(13, Event::sysex((0x21..=0x30).chain(0xF7..=0xF7).collect::<Vec<u8>>())),
        at(14, Event::note_on(2, 64, 100)),
    ];
    let mut whole = vec![0xF0];
    whole.extend(0x01..=0x30u8);
    whole.push(0xF7);

    for capacity in MIN_PACKET_CAPACITY..=40 {
        let packets = encode(capacity, &events);
        let decoded = decode(&mut PacketReader::new(), &packets);
        assert_eq!(
            decoded,
            vec![
                at(11, Event::Clock),
                at(12, Event::Start),
                at(10, Event::sysex(whole.clone())),
                at(14, Event::note_on(2, 64, 100)),
            ],
            "capacity {capacity}"
        );
    }
}

fn channel() -> impl Strategy<Value = u8> {
    0u8..16
}

fn data() -> impl Strategy<Value = u8> {
    0u8..0x80
}

fn channel_voice() -> impl Strategy<Value = Event> {
    prop_oneof![
        (channel(), data(), data()).prop_map(|(c, n, v)| Event::note_on(c, n, v)),
        (channel(), data(), data()).prop_map(|(c, n, v)| Event::note_off(c, n, v)),
        (channel(), data(), data()).prop_map(|(channel, note, value)| Event::PolyPressure {
            channel,
            note,
            value
        }),
        (channel(), data(), data()).prop_map(|(c, n, v)| Event::control_change(c, n, v)),
        (channel(), data()).prop_map(|(channel, program)| Event::ProgramChange { channel, program }),
        (channel(), data()).prop_map(|(channel, value)| Event::ChannelPressure { channel, value }),
        (channel(), -0x2000i16..0x2000).prop_map(|(c, v)| Event::pitch_bend(c, v)),
    ]
}

fn system() -> impl Strategy<Value = Event> {
    prop_oneof![
        data().prop_map(|value| Event::TimeCode { value }),
        (0u16..0x4000).prop_map(|position| Event::SongPosition { position }),
        data().prop_map(|song| Event::SongSelect { song }),
        Just(Event::TuneRequest),
        Just(Event::Clock),
        Just(Event::Start),
        Just(Event::Stop),
        Just(Event::ActiveSensing),
    ]
}

fn sysex() -> impl Strategy<Value = Event> {
    prop::collection::vec(data(), 0..48).prop_map(|body| {
        let mut payload = Vec::with_capacity(body.len() + 2);
        payload.push(0xF0);
        payload.extend(body);
        payload.push(0xF7);
        Event::sysex(payload)
    })
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![4 => channel_voice(), 2 => system(), 1 => sysex()]
}

/// Events with timestamps that mostly advance and occasionally jump back.
fn timed_events() -> impl Strategy<Value = Vec<TimedEvent>> {
    prop::collection::vec((event_strategy(), 0u16..300, any::<bool>()), 1..64).prop_map(|items| {
        let mut clock: u16 = 8000;
        items
            .into_iter()
            .map(|(event, delta, backwards)| {
                let next = if backwards && delta < 10 {
                    clock.wrapping_sub(delta * 40)
                } else {
                    clock.wrapping_add(delta / 4)
                };
                clock = next & TIMESTAMP_MAX;
                TimedEvent::new(Timestamp::new(clock), event)
            })
            .collect()
    })
}

/// A complete SysEx cut into fragments, with Clock messages between some of them.
fn fragmented_sysex() -> impl Strategy<Value = (Vec<u8>, Vec<TimedEvent>)> {
    (
        prop::collection::vec(data(), 0..200),
        prop::collection::vec((1usize..40, any::<bool>()), 1..8),
        0u16..=TIMESTAMP_MAX,
    )
        .prop_map(|(body, cuts, millis)| {
            let mut payload = Vec::with_capacity(body.len() + 2);
            payload.push(0xF0);
            payload.extend(body);
            payload.push(0xF7);

            let mut events = Vec::new();
            let mut rest = payload.as_slice();
            for (size, clock) in cuts.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let n = (*size).min(rest.len());
                events.push(at(millis, Event::sysex(Bytes::copy_from_slice(&rest[..n]))));
                rest = &rest[n..];
                if *clock && !rest.is_empty() {
                    events.push(at(millis, Event::Clock));
                }
            }
            (payload, events)
        })
}

proptest! {
    #[test]
    fn sysex_fragments_with_realtime_read_back(
        (payload, events) in fragmented_sysex(),
        capacity in MIN_PACKET_CAPACITY..64usize,
    ) {
        let packets = encode(capacity, &events);
        let decoded = decode(&mut PacketReader::new(), &packets);

        let timestamp = events[0].timestamp;
        let clocks = events.iter().filter(|e| e.event == Event::Clock).count();
        let mut expected = vec![TimedEvent::new(timestamp, Event::Clock); clocks];
        expected.push(TimedEvent::new(timestamp, Event::sysex(payload)));
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn written_events_read_back(
        events in timed_events(),
        capacity in MIN_PACKET_CAPACITY..512usize,
    ) {
        let packets = encode(capacity, &events);
        prop_assert!(packets.iter().all(|p| !p.is_empty() && p.len() <= capacity));

        let decoded = decode(&mut PacketReader::new(), &packets);
        let expected: Vec<_> = events.iter().map(canonical).collect();
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn arbitrary_bytes_always_make_progress(
        packets in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16),
        max_sysex_len in 1usize..32,
    ) {
        let mut reader = PacketReader::with_config(ReaderConfig { max_sysex_len });
        for packet in &packets {
            reader.reset();
            let mut offset = 0;
            while offset < packet.len() {
                let decoded = reader.decode_one(&packet[offset..]);
                prop_assert!(decoded.consumed > 0);
                prop_assert!(decoded.consumed <= packet.len() - offset);
                if let Some(err) = &decoded.error {
                    prop_assert!(
                        matches!(err, CodecError::SysexTooLarge { .. }),
                        "unexpected error {:?}",
                        err
                    );
                }
                offset += decoded.consumed;
            }
        }
    }
}
