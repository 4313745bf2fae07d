use super::*;
use tokio::time::Instant;

const DEADLINE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn synchronous_ack_is_returned() {
    let result = call("door", DEADLINE, |ack| ack.complete(true)).await;
    assert!(result.expect("ack"));
}

#[tokio::test]
async fn negative_ack_is_a_result_not_an_error() {
    let result = call("door", DEADLINE, |ack| ack.complete(false)).await;
    assert!(!result.expect("negative ack is still an answer"));
}

#[tokio::test]
async fn ack_from_another_task_is_awaited() {
    let result = call("lights", DEADLINE, |ack| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ack.complete(true);
        });
    })
    .await;
    assert!(result.expect("ack"));
}

#[tokio::test]
async fn ack_from_a_plain_thread_is_awaited() {
    let result = call("lights", DEADLINE, |ack| {
        std::thread::spawn(move || ack.complete(false));
    })
    .await;
    assert!(!result.expect("ack"));
}

#[tokio::test]
async fn silent_device_times_out_within_the_deadline() {
    let kept: Arc<Mutex<Option<Ack>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&kept);

    let started = Instant::now();
    let err = call("door", DEADLINE, move |ack| {
        *slot.lock().expect("slot") = Some(ack);
    })
    .await
    .expect_err("silent device must time out");

    assert!(started.elapsed() < DEADLINE * 5);
    assert!(matches!(err, BridgeError::Timeout { target: "door", timeout_ms: 100 }));
    assert_eq!(err.error_code(), "E_ACK_TIMEOUT");

    // A late ack after the waiter gave up is harmless.
    let late = kept.lock().expect("slot").take().expect("ack kept");
    late.complete(true);
    assert!(late.is_completed());
}

#[tokio::test]
async fn dropped_ack_is_abandonment() {
    let err = call("door", DEADLINE, drop).await.expect_err("dropped ack");
    assert!(matches!(err, BridgeError::Abandoned { target: "door" }));
}

#[tokio::test]
async fn first_completion_wins() {
    let result = call("door", DEADLINE, |ack| {
        let racing = ack.clone();
        ack.complete(false);
        racing.complete(true);
        assert!(racing.is_completed());
    })
    .await;
    assert!(!result.expect("first ack"));
}
