mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::strategies::*;
use courier::messaging::{MessageContext, MessageKind};
use courier::registry::ChannelRegistry;
use courier::{ListenerKind, Worker};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// Property: the selected handler is the first declared entry whose predicate accepts
    #[test]
    fn first_accepting_entry_is_selected(flags in predicate_flags_strategy(), payload in payload_strategy()) {
        let mut builder = Worker::builder("prop");
        for (index, accepts) in flags.iter().copied().enumerate() {
            builder = builder.on_call_when(
                format!("h{index}"),
                move |_| accepts,
                move |_, _, _| async move { Ok(json!(index)) },
            );
        }
        let worker = builder.build().unwrap();

        let selected = worker
            .select_handler(ListenerKind::OnCall, None, &payload)
            .map(|entry| entry.name().to_string());
        let expected = flags.iter().position(|accepts| *accepts).map(|i| format!("h{i}"));
        prop_assert_eq!(selected, expected);
    }

    /// Property: dispatch runs exactly the selected entry and returns its result
    #[test]
    fn dispatch_returns_first_accepting_result(flags in predicate_flags_strategy()) {
        let mut builder = Worker::builder("prop");
        for (index, accepts) in flags.iter().copied().enumerate() {
            builder = builder.on_call_when(
                format!("h{index}"),
                move |_| accepts,
                move |_, _, _| async move { Ok(json!(index)) },
            );
        }
        let worker = builder.build().unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let reply = runtime
            .block_on(worker.dispatch(
                ListenerKind::OnCall,
                json!(null),
                MessageContext::new(MessageKind::Request, None),
                None,
            ))
            .unwrap();

        let expected = flags.iter().position(|accepts| *accepts).map(|i| json!(i));
        prop_assert_eq!(reply, expected);
    }

    /// Property: channel membership behaves as a set per channel, in first-subscribe order
    #[test]
    fn channel_subscriptions_form_ordered_sets(batches in subscription_strategy()) {
        let registry = ChannelRegistry::new();
        let mut model: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (worker, channels) in &batches {
            registry.subscribe(worker, channels);
            for channel in channels {
                let members = model.entry(channel.clone()).or_default();
                if !members.contains(worker) {
                    members.push(worker.clone());
                }
            }
        }

        for (channel, members) in &model {
            let resolved = registry.resolve(channel).unwrap();
            prop_assert_eq!(&resolved, members);
        }
        let known: BTreeSet<String> = registry.channel_names().into_iter().collect();
        let expected: BTreeSet<String> = model.keys().cloned().collect();
        prop_assert_eq!(known, expected);
    }

    /// Property: worker names that pass validation are registered and resolvable
    #[test]
    fn registered_names_resolve(names in prop::collection::btree_set(name_strategy(), 1..8)) {
        let registry = courier::registry::WorkerRegistry::new();
        for name in &names {
            let worker = Worker::builder(name.as_str())
                .on_call("noop", |_, m, _| async move { Ok(m) })
                .build()
                .unwrap();
            registry.register(worker).unwrap();
        }

        let registered: Vec<String> = names.iter().cloned().collect();
        prop_assert_eq!(registry.names(), registered);
        for name in &names {
            let found = registry.get(name).unwrap();
            prop_assert_eq!(found.name(), name.as_str());
        }
    }
}
