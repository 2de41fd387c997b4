mod common;

use common::{Call, RecordingDataAccess};
use entitier_core::{
    DalError, ExecuteOptions, ProcedureService, ServiceConfig, ServiceError, Value,
};

fn returning_id() -> ExecuteOptions {
    ExecuteOptions {
        return_generated_id: true,
        ..ExecuteOptions::default()
    }
}

#[test]
fn zero_rows_affected_fails_by_default() {
    let mut service = ProcedureService::new(RecordingDataAccess::affecting(0));

    let err = service
        .execute("sp_DeleteOrder", ExecuteOptions::default())
        .expect_err("execute should fail");

    assert!(
        matches!(err, ServiceError::NoRowsAffected { ref procedure } if procedure == "sp_DeleteOrder")
    );
}

#[test]
fn zero_rows_affected_is_allowed_when_not_strict() {
    let mut service = ProcedureService::new(RecordingDataAccess::affecting(0));

    service
        .execute(
            "sp_DeleteOrder",
            ExecuteOptions {
                fail_if_no_rows_affected: false,
                ..ExecuteOptions::default()
            },
        )
        .expect("execute should succeed");
}

#[test]
fn negative_rows_affected_counts_as_none() {
    let mut service = ProcedureService::new(RecordingDataAccess::affecting(-1));

    assert!(matches!(
        service.execute("sp_DeleteOrder", ExecuteOptions::default()),
        Err(ServiceError::NoRowsAffected { .. })
    ));
}

#[test]
fn referential_integrity_code_wins_over_rows_affected() {
    let mut data = RecordingDataAccess::affecting(3);
    data.return_value = "547".to_string();
    let mut service = ProcedureService::new(data);

    let err = service
        .execute("sp_DeleteCustomer", ExecuteOptions::default())
        .expect_err("execute should fail");

    assert!(matches!(
        err,
        ServiceError::ReferentialIntegrityViolation { ref procedure } if procedure == "sp_DeleteCustomer"
    ));
    assert!(err.to_string().contains("referenced by other tables"));
}

#[test]
fn referential_integrity_code_is_configurable() {
    let mut data = RecordingDataAccess::affecting(0);
    data.return_value = "547".to_string();
    let mut service = ProcedureService::with_config(data, ServiceConfig::sqlite());

    assert!(matches!(
        service.execute("sp_DeleteCustomer", ExecuteOptions::default()),
        Err(ServiceError::NoRowsAffected { .. })
    ));

    service.data_access_mut().return_value = "787".to_string();
    assert!(matches!(
        service.execute("sp_DeleteCustomer", ExecuteOptions::default()),
        Err(ServiceError::ReferentialIntegrityViolation { .. })
    ));
}

#[test]
fn empty_return_value_never_matches_an_empty_code() {
    let config = ServiceConfig {
        referential_integrity_code: String::new(),
        ..ServiceConfig::default()
    };
    let mut service = ProcedureService::with_config(RecordingDataAccess::affecting(1), config);

    service
        .execute("sp_DeleteCustomer", ExecuteOptions::default())
        .expect("execute should succeed");
}

#[test]
fn generated_id_is_stored_only_when_requested() {
    let mut data = RecordingDataAccess::affecting(1);
    data.id = Value::Integer(42);
    let mut service = ProcedureService::new(data);

    service
        .execute("sp_InsertOrder", ExecuteOptions::default())
        .expect("execute should succeed");
    assert_eq!(service.id(), None);

    service.execute("sp_InsertOrder", returning_id()).expect("execute should succeed");
    assert_eq!(service.id(), Some(42));
}

#[test]
fn non_positive_generated_id_leaves_current_id_untouched() {
    let mut data = RecordingDataAccess::affecting(1);
    data.id = Value::Integer(9);
    let mut service = ProcedureService::new(data);
    service.execute("sp_InsertOrder", returning_id()).expect("execute should succeed");

    service.data_access_mut().id = Value::Integer(0);
    service.execute("sp_InsertOrder", returning_id()).expect("execute should succeed");
    assert_eq!(service.id(), Some(9));

    service.data_access_mut().id = Value::Null;
    service.execute("sp_InsertOrder", returning_id()).expect("execute should succeed");
    assert_eq!(service.id(), Some(9));
}

#[test]
fn generated_id_accepts_numeric_text() {
    let mut data = RecordingDataAccess::affecting(1);
    data.id = Value::from("1234");
    let mut service = ProcedureService::new(data);

    service.execute("sp_InsertOrder", returning_id()).expect("execute should succeed");

    assert_eq!(service.id(), Some(1234));
}

#[test]
fn unconvertible_generated_id_is_a_conversion_failure() {
    let mut data = RecordingDataAccess::affecting(1);
    data.id = Value::from("not-a-number");
    let mut service = ProcedureService::new(data);

    assert!(matches!(
        service.execute("sp_InsertOrder", returning_id()),
        Err(ServiceError::Conversion(_))
    ));
}

#[test]
fn id_return_name_is_scoped_to_the_call() {
    let mut service = ProcedureService::new(RecordingDataAccess::affecting(1));
    service.set_id_return_name("@NewId");

    service
        .execute("sp_InsertOrder", ExecuteOptions::default())
        .expect("execute should succeed");

    let data = service.data_access();
    assert_eq!(
        data.calls[0],
        Call::Execute {
            procedure: "sp_InsertOrder".to_string(),
            scalar: false,
            id_return_name: "@NewId".to_string(),
        }
    );
    assert_eq!(data.id_return_name, "");
}

#[test]
fn id_return_name_is_cleared_when_the_collaborator_fails() {
    let mut data = RecordingDataAccess::affecting(1);
    data.fail_with = Some("timeout".to_string());
    let mut service = ProcedureService::new(data);

    assert!(service
        .execute("sp_InsertOrder", ExecuteOptions::default())
        .is_err());

    assert_eq!(service.data_access().id_return_name, "");
}

#[test]
fn transactional_execute_uses_the_transaction_path() {
    let mut service = ProcedureService::new(RecordingDataAccess::affecting(1));

    service
        .execute(
            "sp_InsertOrder",
            ExecuteOptions {
                transactional: true,
                ..ExecuteOptions::default()
            },
        )
        .expect("transactional execute should succeed");
    service.transaction_finish(true).expect("commit should succeed");

    assert_eq!(
        service.data_access().calls,
        vec![
            Call::ExecuteWithTransaction {
                procedure: "sp_InsertOrder".to_string(),
                id_return_name: "ID".to_string(),
            },
            Call::TransactionFinish(true),
        ]
    );
}

#[test]
fn collaborator_failures_propagate_unchanged() {
    let mut data = RecordingDataAccess::affecting(0);
    data.fail_with = Some("deadlock victim".to_string());
    let mut service = ProcedureService::new(data);

    let err = service
        .execute("sp_InsertOrder", ExecuteOptions::default())
        .expect_err("execute should fail");

    match err {
        ServiceError::DataAccess(DalError::Backend(inner)) => {
            assert_eq!(inner.to_string(), "deadlock victim");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn handles_pass_through_to_the_collaborator() {
    let mut service = ProcedureService::new(RecordingDataAccess::default());
    service.connect().expect("connect should succeed");
    service.set_connection(Some("server=primary".to_string()));
    service.set_transaction(Some(7));

    assert_eq!(service.connection().map(String::as_str), Some("server=primary"));
    assert_eq!(service.transaction(), Some(&7));

    service.disconnect().expect("disconnect should succeed");
    assert_eq!(
        service.data_access().calls,
        vec![Call::Connect, Call::Disconnect]
    );
}
