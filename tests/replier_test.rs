use ceflow::{
    event::payload::APPLICATION_JSON,
    reply::{
        EventError, PayloadPolicy, Replier, ResponseOption, ERROR_CODE_ADAPTER_PROCESS,
        EXTENSION_CATEGORY, EXTENSION_CATEGORY_VALUE_ERROR, EXTENSION_CATEGORY_VALUE_SUCCESS,
    },
    EventEnvelope, ExtensionValue, Payload,
};
use proptest::prelude::*;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const TARGET: &str = "proptest-target";

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn replier(policy: PayloadPolicy) -> Replier {
    Replier::builder(TARGET)
        .payload_policy(policy)
        .build()
        .unwrap()
}

prop_compose! {
    fn inbound_event()(
        id in "[a-z0-9-]{1,16}",
        event_type in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}",
        source in "[a-z]{1,12}",
        subject in proptest::option::of("[a-zA-Z ]{1,20}"),
    ) -> EventEnvelope {
        let mut builder = EventEnvelope::builder()
            .id(&id)
            .event_type(&event_type)
            .source(&source);
        if let Some(subject) = subject {
            builder = builder.subject(&subject);
        }
        builder.build().unwrap()
    }
}

fn category(event: &EventEnvelope) -> Option<&ExtensionValue> {
    event.extension(EXTENSION_CATEGORY)
}

proptest! {
    #[test]
    fn ok_always_builds_reply(inbound in inbound_event(), payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        let reply = replier(PayloadPolicy::Always).ok(&inbound, payload.clone(), &[]);
        prop_assert!(reply.is_ack());

        let out = reply.event.unwrap();
        prop_assert_eq!(out.event_type, format!("{}.response", inbound.event_type));
        prop_assert_eq!(out.source, TARGET);
        prop_assert!(!out.id.is_empty());
        prop_assert_eq!(
            out.extensions.get(EXTENSION_CATEGORY),
            Some(&ExtensionValue::from(EXTENSION_CATEGORY_VALUE_SUCCESS))
        );
        prop_assert_eq!(out.data_content_type.as_deref(), Some(APPLICATION_JSON));
        prop_assert_eq!(out.data, Some(payload));
    }

    #[test]
    fn ok_without_always_only_acks(inbound in inbound_event()) {
        for policy in [PayloadPolicy::Errors, PayloadPolicy::Never] {
            let reply = replier(policy).ok(&inbound, Payload::from(b"data".to_vec()), &[]);
            prop_assert!(reply.is_ack());
            prop_assert!(reply.event.is_none());
        }
    }

    #[test]
    fn error_follows_policy(inbound in inbound_event(), cause in "[a-z ]{1,30}") {
        let reply = replier(PayloadPolicy::Never).error(&inbound, ERROR_CODE_ADAPTER_PROCESS, &cause, None, &[]);
        prop_assert!(reply.is_ack());
        prop_assert!(reply.event.is_none());

        for policy in [PayloadPolicy::Always, PayloadPolicy::Errors] {
            let out = replier(policy)
                .error(&inbound, ERROR_CODE_ADAPTER_PROCESS, &cause, None, &[])
                .event
                .unwrap();
            prop_assert_eq!(category(&out), Some(&ExtensionValue::from(EXTENSION_CATEGORY_VALUE_ERROR)));

            let payload: EventError = serde_json::from_slice(out.data().unwrap()).unwrap();
            prop_assert_eq!(payload.code, ERROR_CODE_ADAPTER_PROCESS);
            prop_assert_eq!(payload.description, cause.clone());
        }
    }

    #[test]
    fn replies_differ_only_by_generated_id(inbound in inbound_event()) {
        let replier = Replier::builder(TARGET).processed_headers().build().unwrap();

        let mut first = replier.ok(&inbound, Payload::from(b"x".to_vec()), &[]).event.unwrap();
        let mut second = replier.ok(&inbound, Payload::from(b"x".to_vec()), &[]).event.unwrap();
        first.id.clear();
        second.id.clear();
        prop_assert_eq!(first, second);

        let mut first = replier.error(&inbound, ERROR_CODE_ADAPTER_PROCESS, "boom", None, &[]).event.unwrap();
        let mut second = replier.error(&inbound, ERROR_CODE_ADAPTER_PROCESS, "boom", None, &[]).event.unwrap();
        first.id.clear();
        second.id.clear();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn explicit_id_is_kept(inbound in inbound_event(), id in "[a-z0-9]{1,24}") {
        let out = replier(PayloadPolicy::Always)
            .ok(&inbound, Payload::Empty, &[ResponseOption::with_id(id.clone())])
            .event
            .unwrap();
        prop_assert_eq!(out.id, id);
        prop_assert_eq!(out.data, None);
    }
}
