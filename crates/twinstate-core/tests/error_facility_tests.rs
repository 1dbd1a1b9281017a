#![allow(clippy::unwrap_used, clippy::expect_used)]

use twinstate_core::{ExError, ExErrorKind, TwinError};

#[test]
fn test_twin_errors_map_to_stable_kinds() {
    let cases = [
        (TwinError::Conflict { entity_id: "ns:1".into() }, ExErrorKind::Conflict, "ERR_CONFLICT"),
        (TwinError::EntityNotFound { entity_id: "ns:1".into() }, ExErrorKind::NotFound, "ERR_NOT_FOUND"),
        (
            TwinError::FieldNotAccessible { entity_id: "ns:1".into(), path: "/a".into() },
            ExErrorKind::NotAccessible,
            "ERR_NOT_ACCESSIBLE",
        ),
        (
            TwinError::NotModifiable { entity_id: "ns:1".into(), path: "/_revision".into(), reason: "managed".into() },
            ExErrorKind::NotModifiable,
            "ERR_NOT_MODIFIABLE",
        ),
        (
            TwinError::PreconditionFailed { entity_id: "ns:1".into(), expected: 1, actual: 2 },
            ExErrorKind::PreconditionFailed,
            "ERR_PRECONDITION_FAILED",
        ),
        (
            TwinError::Unhandled { command_kind: "retrieve".into(), entity_id: "ns:1".into() },
            ExErrorKind::Unhandled,
            "ERR_UNHANDLED",
        ),
        (TwinError::InvalidPayload { reason: "x".into() }, ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
        (TwinError::Internal { message: "x".into() }, ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    for (err, kind, code) in cases {
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), kind);
        assert_eq!(ex.code(), code);
    }
}

#[test]
fn test_context_is_preserved() {
    let ex: ExError = TwinError::FieldNotAccessible {
        entity_id: "ns:1".into(),
        path: "/features/f1".into(),
    }
    .into();
    assert_eq!(ex.entity_id(), Some("ns:1"));
    assert_eq!(ex.path(), Some("/features/f1"));
}

#[test]
fn test_client_errors_are_not_retryable() {
    for kind in [
        ExErrorKind::Conflict,
        ExErrorKind::NotFound,
        ExErrorKind::NotAccessible,
        ExErrorKind::NotModifiable,
        ExErrorKind::PreconditionFailed,
    ] {
        assert!(kind.is_client_error());
        assert!(!kind.is_retryable());
    }
    assert!(!ExErrorKind::Unhandled.is_client_error());
    assert!(ExErrorKind::Timeout.is_retryable());
}

#[test]
fn test_serde_json_errors_become_serialization_errors() {
    let err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
    let twin: TwinError = err.into();
    let ex: ExError = twin.into();
    assert_eq!(ex.kind(), ExErrorKind::Serialization);
}
