use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use realm::game::types::{Direction, EntityId, Position};
use realm::network::codec::PacketCodec;
use realm::network::packet::{MapBatch, MovementUpdate, Packet};

fn batch(n: i32) -> Packet {
    MapBatch {
        movements: (0..n)
            .map(|i| MovementUpdate {
                entity: EntityId::new(),
                position: Position::new(i % 32, i / 32),
                direction: Direction::Down,
                correction: false,
            })
            .collect(),
        animations: Vec::new(),
        action_messages: Vec::new(),
    }
    .into()
}

fn bench_codec(c: &mut Criterion) {
    let codec = PacketCodec::default();
    let packet = batch(200);
    let bytes = codec.serialize(&packet).unwrap();

    c.bench_function("serialize_map_batch_200", |b| b.iter(|| codec.serialize(black_box(&packet))));
    c.bench_function("deserialize_map_batch_200", |b| b.iter(|| codec.deserialize(black_box(&bytes))));
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
