//! End-to-end producer/consumer scenarios across real task threads.

use std::sync::Arc;
use std::time::Duration;

use rtos_sim::{
    delay, now_ticks, Kernel, MessageQueue, ReceiveTimeout, TaskPriority, TaskRunner, Tick,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Record {
    id: u32,
    sent_at: Tick,
}

#[test]
fn paced_producer_consumer_delivers_in_order() {
    rtos_sim::logging::init_tracing();

    let queue: Arc<MessageQueue<Record>> = Arc::new(MessageQueue::new());
    let received: Arc<MessageQueue<(Record, Tick)>> = Arc::new(MessageQueue::new());

    let tx = Arc::clone(&queue);
    let mut producer = TaskRunner::new("producer", TaskPriority::LOW, move || {
        for id in 1..=5 {
            tx.send(Record {
                id,
                sent_at: now_ticks(),
            });
            delay(Duration::from_millis(20));
        }
    });

    let (rx, out) = (Arc::clone(&queue), Arc::clone(&received));
    let mut consumer = TaskRunner::new("consumer", TaskPriority::NORMAL, move || {
        for _ in 0..5 {
            let record = rx.recv();
            out.send((record, now_ticks()));
        }
    });

    consumer.start().unwrap();
    producer.start().unwrap();
    producer.join().unwrap();
    consumer.join().unwrap();

    let log: Vec<(Record, Tick)> = std::iter::from_fn(|| received.try_receive()).collect();
    assert_eq!(log.len(), 5);

    let ids: Vec<u32> = log.iter().map(|(r, _)| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    // Reception ticks never go backwards, and never precede the send.
    assert!(log.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(log.iter().all(|(r, at)| r.sent_at <= *at));
    assert!(queue.is_empty());
}

#[test]
fn many_producers_one_consumer_each_item_once() {
    const PRODUCERS: u32 = 8;
    const PER_PRODUCER: u32 = 250;

    let queue: Arc<MessageQueue<(u32, u32)>> = Arc::new(MessageQueue::new());
    let mut kernel = Kernel::new();

    for p in 0..PRODUCERS {
        let tx = Arc::clone(&queue);
        kernel
            .spawn_task(format!("producer-{p}"), TaskPriority::LOW, move || {
                for seq in 0..PER_PRODUCER {
                    tx.send((p, seq));
                }
            })
            .unwrap();
    }

    let rx = Arc::clone(&queue);
    let collected: Arc<MessageQueue<Vec<(u32, u32)>>> = Arc::new(MessageQueue::new());
    let out = Arc::clone(&collected);
    kernel
        .spawn_task("consumer", TaskPriority::HIGH, move || {
            let total = (PRODUCERS * PER_PRODUCER) as usize;
            let items: Vec<_> = (0..total).map(|_| rx.recv()).collect();
            out.send(items);
        })
        .unwrap();

    kernel.start().unwrap();
    assert!(kernel.join_all().iter().all(|(_, r)| r.is_ok()));

    let items = collected.try_receive().unwrap();
    assert_eq!(items.len(), (PRODUCERS * PER_PRODUCER) as usize);

    // Per-producer order survives interleaving.
    for p in 0..PRODUCERS {
        let seqs: Vec<u32> = items.iter().filter(|(src, _)| *src == p).map(|(_, s)| *s).collect();
        assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
    assert_eq!(
        queue.receive(Some(Duration::from_millis(10))),
        Err(ReceiveTimeout {
            waited: Duration::from_millis(10)
        })
    );
}
