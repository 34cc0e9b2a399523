use dispatcher::{DispatchError, Dispatcher, Priority};
use futures::executor::block_on;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_invoke_from_owning_thread_runs_in_place() {
    let dispatcher = Dispatcher::new();
    let steps = Arc::new(Mutex::new(Vec::new()));

    let s = steps.clone();
    let inner = dispatcher.clone();
    dispatcher.dispatch(move || {
        s.lock().unwrap().push("before");

        let s_inner = s.clone();
        let value = inner
            .invoke_with(Priority::Low, move || {
                s_inner.lock().unwrap().push("invoked");
                21 * 2
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(inner.pending(Priority::LOWEST), 0);
        s.lock().unwrap().push("after");
    });

    dispatcher.execute().unwrap();

    assert_eq!(*steps.lock().unwrap(), vec!["before", "invoked", "after"]);
}

#[test]
fn test_invoke_from_foreign_thread_blocks_until_executed() {
    let dispatcher = Dispatcher::new();

    let caller = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || dispatcher.invoke(|| String::from("from the loop")))
    };

    // Keep draining until the foreign call has been queued and served.
    while !caller.is_finished() {
        dispatcher.execute().unwrap();
        thread::yield_now();
    }

    assert_eq!(caller.join().unwrap().unwrap(), "from the loop");
}

#[test]
fn test_invoke_from_foreign_thread_propagates_panic() {
    let dispatcher = Dispatcher::spawn().unwrap();

    let result = dispatcher.invoke(|| -> u32 { panic!("invoke failed") });

    assert!(matches!(result, Err(DispatchError::OperationPanicked(ref message)) if message == "invoke failed"));

    // The loop survives a panicking invoke.
    assert_eq!(dispatcher.invoke(|| 7).unwrap(), 7);
    dispatcher.stop();
}

#[test]
fn test_invoke_runs_on_dispatcher_thread() {
    let dispatcher = Dispatcher::builder().name("invoke-target").spawn().unwrap();

    let name = dispatcher
        .invoke_with(Priority::High, || thread::current().name().map(str::to_string))
        .unwrap();

    assert_eq!(name.as_deref(), Some("invoke-target"));
    dispatcher.stop();
}

#[test]
fn test_invoke_async_resolves_with_result() {
    let dispatcher = Dispatcher::new();

    let operation = dispatcher.invoke_async(|| vec![1, 2, 3]);
    assert_eq!(dispatcher.pending(Priority::Medium), 1);

    dispatcher.execute().unwrap();

    assert_eq!(block_on(operation).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_invoke_async_captures_panic() {
    let dispatcher = Dispatcher::new();

    let operation = dispatcher.invoke_async_with(Priority::Low, || -> u8 { panic!("async failure") });
    dispatcher.execute().unwrap();

    let result = block_on(operation);
    assert!(matches!(result, Err(DispatchError::OperationPanicked(ref message)) if message == "async failure"));
}

#[test]
fn test_invoke_async_from_owning_thread_does_not_block() {
    let dispatcher = Dispatcher::new();
    let steps = Arc::new(Mutex::new(Vec::new()));

    let s = steps.clone();
    let inner = dispatcher.clone();
    dispatcher.dispatch_async(async move {
        let s_inner = s.clone();
        let operation = inner.invoke_async(move || {
            s_inner.lock().unwrap().push("operation".to_string());
            5
        });
        s.lock().unwrap().push("queued".to_string());

        let value = operation.await.unwrap();
        s.lock().unwrap().push(format!("resumed with {value}"));
    });

    dispatcher.execute().unwrap();

    assert_eq!(
        *steps.lock().unwrap(),
        vec!["queued", "operation", "resumed with 5"]
    );
}

#[test]
fn test_invoke_async_dropped_dispatcher_cancels() {
    let dispatcher = Dispatcher::new();
    let operation = dispatcher.invoke_async(|| 1);

    drop(dispatcher);

    assert!(matches!(block_on(operation), Err(DispatchError::Canceled)));
}
