//! End-to-end tests for the alternating-bit protocol over an in-process link.
//!
//! Sender and receiver run as separate tokio tasks joined by a
//! [`MemoryLink`] pair, each side optionally wrapped in a [`Simulator`] that
//! drops or corrupts its outgoing datagrams.  Time is paused, so every
//! retransmission timeout elapses instantly and deterministically.

use std::time::Duration;

use rdt_over_udp::channel::MemoryLink;
use rdt_over_udp::receiver::ReceiverStats;
use rdt_over_udp::sender::SenderStats;
use rdt_over_udp::simulator::{Fault, Simulator, SimulatorConfig};
use rdt_over_udp::{RdtConfig, Receiver, Sender};

type Link = Simulator<MemoryLink>;

struct Outcome {
    delivered: Vec<Vec<u8>>,
    end_markers: usize,
    sender: SenderStats,
    receiver: ReceiverStats,
}

fn config() -> RdtConfig {
    RdtConfig::default().with_retransmit_timeout(Duration::from_millis(100))
}

fn payloads(items: &[&str]) -> Vec<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}

/// Run a full transfer of `items` followed by close on both sides.
async fn transfer(
    items: Vec<Vec<u8>>,
    sender_link: impl FnOnce(MemoryLink) -> Link,
    receiver_link: impl FnOnce(MemoryLink) -> Link,
    config: RdtConfig,
) -> Outcome {
    let (a, b) = MemoryLink::pair();
    let mut sender = Sender::new(sender_link(a), config.clone());
    let mut receiver = Receiver::new(receiver_link(b), config);

    let rx = tokio::spawn(async move {
        let mut delivered = Vec::new();
        loop {
            match receiver.recv().await.expect("receiver recv") {
                Some(chunk) => delivered.push(chunk),
                None => break,
            }
        }
        // A second call after end-of-stream must not produce anything new.
        let extra = receiver.recv().await.expect("recv after end-of-stream");
        let end_markers = 1 + usize::from(extra.is_some());
        let stats = receiver.close().await.expect("receiver close");
        (delivered, end_markers, stats)
    });

    let tx = tokio::spawn(async move {
        for item in &items {
            sender.send(item).await.expect("sender send");
        }
        sender.close().await.expect("sender close")
    });

    let (rx, tx) = tokio::join!(rx, tx);
    let (delivered, end_markers, receiver) = rx.unwrap();
    Outcome {
        delivered,
        end_markers,
        sender: tx.unwrap(),
        receiver,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn clean_channel_delivers_in_order() {
    let out = transfer(
        payloads(&["a", "b", "c"]),
        Simulator::passthrough,
        Simulator::passthrough,
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b", "c"]));
    assert_eq!(out.end_markers, 1);
    assert_eq!(out.sender.retransmissions, 0);
    // Three payloads plus end-of-stream.
    assert_eq!(out.sender.confirmed, 4);
    assert_eq!(out.receiver.delivered, 3);
    assert_eq!(out.receiver.duplicates, 0);
}

#[tokio::test(start_paused = true)]
async fn lost_data_unit_is_retransmitted() {
    // Outgoing sender datagrams: #0 = "a", #1 = first copy of "b".
    let out = transfer(
        payloads(&["a", "b", "c"]),
        |l| Simulator::passthrough(l).with_fault(1, Fault::Drop),
        Simulator::passthrough,
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b", "c"]));
    assert_eq!(out.sender.retransmissions, 1);
    assert_eq!(out.receiver.duplicates, 0);
}

#[tokio::test(start_paused = true)]
async fn lost_ack_causes_duplicate_that_is_discarded() {
    // Outgoing receiver datagrams: #0 = ack for "a".
    let out = transfer(
        payloads(&["a", "b", "c"]),
        Simulator::passthrough,
        |l| Simulator::passthrough(l).with_fault(0, Fault::Drop),
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b", "c"]));
    assert_eq!(out.sender.retransmissions, 1);
    assert_eq!(out.receiver.duplicates, 1);
    assert_eq!(out.receiver.delivered, 3);
}

#[tokio::test(start_paused = true)]
async fn corrupted_data_unit_is_rejected_and_resent() {
    let out = transfer(
        payloads(&["a", "b", "c"]),
        |l| Simulator::passthrough(l).with_fault(0, Fault::Corrupt),
        Simulator::passthrough,
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b", "c"]));
    assert_eq!(out.receiver.corrupted, 1);
    // The receiver's repeated ack carries the other bit; the sender ignores
    // it and resends "a" on timeout.
    assert_eq!(out.sender.stale_acks, 1);
    assert_eq!(out.sender.retransmissions, 1);
}

#[tokio::test(start_paused = true)]
async fn corrupted_ack_never_flips_the_bit() {
    let out = transfer(
        payloads(&["a", "b"]),
        Simulator::passthrough,
        |l| Simulator::passthrough(l).with_fault(0, Fault::Corrupt),
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b"]));
    assert_eq!(out.sender.corrupted_acks, 1);
    assert_eq!(out.receiver.duplicates, 1);
}

#[tokio::test(start_paused = true)]
async fn every_third_unit_corrupted_in_both_directions() {
    let every_third = |l: MemoryLink| {
        Simulator::new(
            l,
            SimulatorConfig {
                corrupt_every: Some(3),
                ..Default::default()
            },
        )
    };
    let items: Vec<Vec<u8>> = (0..20).map(|i| format!("chunk-{i:02}").into_bytes()).collect();

    let out = transfer(items.clone(), every_third, every_third, config()).await;

    assert_eq!(out.delivered, items);
    assert!(out.sender.retransmissions > 0);
}

#[tokio::test(start_paused = true)]
async fn random_loss_and_corruption_preserve_the_stream() {
    for seed in 0..8u64 {
        let faulty = move |salt: u64| {
            move |l: MemoryLink| {
                Simulator::new(
                    l,
                    SimulatorConfig {
                        loss_rate: 0.25,
                        corrupt_rate: 0.15,
                        seed: seed * 2 + salt,
                        ..Default::default()
                    },
                )
            }
        };
        let items: Vec<Vec<u8>> = (0..40u32)
            .map(|i| i.to_be_bytes().repeat((i % 5 + 1) as usize))
            .collect();

        let out = transfer(items.clone(), faulty(0), faulty(1), config()).await;

        assert_eq!(out.delivered, items, "seed {seed}");
        assert_eq!(out.end_markers, 1, "seed {seed}");
        assert_eq!(out.receiver.delivered, 40, "seed {seed}");
    }
}

#[tokio::test(start_paused = true)]
async fn identical_payloads_are_not_mistaken_for_duplicates() {
    let items = payloads(&["same", "same", "same"]);
    let out = transfer(
        items.clone(),
        Simulator::passthrough,
        Simulator::passthrough,
        config(),
    )
    .await;
    assert_eq!(out.delivered, items);
}

#[tokio::test(start_paused = true)]
async fn empty_send_does_not_end_the_stream() {
    let (a, b) = MemoryLink::pair();
    let mut sender = Sender::new(a, config());
    let mut receiver = Receiver::new(b, config());

    let rx = tokio::spawn(async move {
        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        receiver.close().await.unwrap();
        (first, second)
    });

    sender.send(b"").await.unwrap();
    sender.send(b"real").await.unwrap();
    let stats = sender.close().await.unwrap();

    let (first, second) = rx.await.unwrap();
    assert_eq!(first.as_deref(), Some(b"real".as_slice()));
    assert_eq!(second, None);
    assert_eq!(stats.confirmed, 2);
}

// ---------------------------------------------------------------------------
// Close handshake
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lost_final_ack_is_answered_while_lingering() {
    // Receiver acks: #0 "a", #1 "b", #2 end-of-stream (dropped).
    let out = transfer(
        payloads(&["a", "b"]),
        Simulator::passthrough,
        |l| Simulator::passthrough(l).with_fault(2, Fault::Drop),
        config(),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a", "b"]));
    assert_eq!(out.end_markers, 1);
    assert_eq!(out.sender.confirmed, 3);
    assert_eq!(out.receiver.duplicates, 1);
}

#[tokio::test(start_paused = true)]
async fn peer_gone_during_close_counts_as_delivered() {
    // No lingering: the receiver releases its end right after end-of-stream,
    // so the sender's retransmitted end-of-stream meets a closed channel.
    let out = transfer(
        payloads(&["a"]),
        Simulator::passthrough,
        |l| Simulator::passthrough(l).with_fault(1, Fault::Drop),
        config().with_linger(Duration::ZERO),
    )
    .await;

    assert_eq!(out.delivered, payloads(&["a"]));
    assert_eq!(out.end_markers, 1);
    // "a" confirmed; end-of-stream ended by the peer closing.
    assert_eq!(out.sender.confirmed, 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_close_gives_up_and_releases() {
    let (a, b) = MemoryLink::pair();
    // Never delivers anything, but keeps the channel open.
    let silent = Simulator::new(
        a,
        SimulatorConfig {
            loss_rate: 1.0,
            ..Default::default()
        },
    );
    let sender = Sender::new(silent, config().with_close_attempts(3));

    let stats = sender.close().await.expect("force-close is not an error");
    assert_eq!(stats.transmissions, 3);
    assert_eq!(stats.confirmed, 0);
    drop(b);
}
