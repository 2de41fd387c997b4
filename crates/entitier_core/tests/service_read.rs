mod common;

use common::{columns, Call, Customer, CustomerStatus, CustomerSummary, RecordingDataAccess};
use entitier_core::{
    ConversionError, MapError, ProcedureService, ServiceError, SqlType, Value,
};

#[test]
fn get_maps_a_single_row_with_enum_and_numeric_coercion() {
    let mut data = RecordingDataAccess::default();
    data.read_row = Some(columns([
        ("Id", Value::from("7")),
        ("Name", Value::from("Acme")),
        ("Status", Value::from("Active")),
    ]));
    let mut service = ProcedureService::new(data);
    service.parameter_add("@Id", 7_i64, SqlType::Int).expect("queue argument");

    let customer = service
        .get::<Customer>("sp_GetCustomerById")
        .expect("read should succeed")
        .expect("customer row should exist");

    assert_eq!(customer.id, Some(7));
    assert_eq!(customer.name.as_deref(), Some("Acme"));
    assert_eq!(customer.status, Some(CustomerStatus::Active));
    assert_eq!(customer.credit_limit, None);
    assert!(service.rows_found());
}

#[test]
fn get_declares_expected_columns_from_the_record_shape() {
    let mut service = ProcedureService::new(RecordingDataAccess::default());

    service.get::<CustomerSummary>("sp_GetSummary").expect("read should succeed");

    assert_eq!(
        service.data_access().calls,
        vec![Call::Read {
            procedure: "sp_GetSummary".to_string(),
            expected: vec!["Id".to_string(), "Name".to_string(), "OrderCount".to_string()],
        }]
    );
}

#[test]
fn get_without_a_row_returns_none_and_clears_rows_found() {
    let mut data = RecordingDataAccess::default();
    data.read_row = Some(columns([("Id", Value::Integer(1))]));
    let mut service = ProcedureService::new(data);
    service.get::<Customer>("sp_GetCustomerById").expect("read should succeed");
    assert!(service.rows_found());

    service.data_access_mut().read_row = None;
    let missing = service.get::<Customer>("sp_GetCustomerById").expect("read should succeed");

    assert!(missing.is_none());
    assert!(!service.rows_found());
}

#[test]
fn get_list_preserves_result_order() {
    let mut data = RecordingDataAccess::default();
    data.read_rows = vec![
        columns([("Id", Value::Integer(3)), ("Name", Value::from("Gamma"))]),
        columns([("Id", Value::Integer(1)), ("Name", Value::from("Alpha"))]),
        columns([("Id", Value::Integer(2)), ("Name", Value::from("Beta"))]),
    ];
    let mut service = ProcedureService::new(data);

    let customers = service.get_list::<Customer>("sp_ListCustomers").expect("list should succeed");

    let ids: Vec<Option<i64>> = customers.iter().map(|customer| customer.id).collect();
    assert_eq!(ids, vec![Some(3), Some(1), Some(2)]);
    assert!(service.rows_found());
}

#[test]
fn empty_list_clears_rows_found() {
    let mut service = ProcedureService::new(RecordingDataAccess::default());

    let customers = service.get_list::<Customer>("sp_ListCustomers").expect("list should succeed");

    assert!(customers.is_empty());
    assert!(!service.rows_found());
}

#[test]
fn unknown_enum_member_is_a_conversion_failure() {
    let mut data = RecordingDataAccess::default();
    data.read_rows = vec![columns([("Status", Value::from("Dormant"))])];
    let mut service = ProcedureService::new(data);

    let err = service
        .get_list::<Customer>("sp_ListCustomers")
        .expect_err("list should fail");

    match err {
        ServiceError::Conversion(MapError::Conversion { column, source }) => {
            assert_eq!(column, "Status");
            assert_eq!(
                source,
                ConversionError::UnknownVariant {
                    target: "CustomerStatus",
                    value: "Dormant".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!service.rows_found());
}

#[test]
fn scalar_null_is_absent_not_zero() {
    let mut data = RecordingDataAccess::default();
    data.scalar_value = Value::Null;
    let mut service = ProcedureService::new(data);

    assert_eq!(service.scalar("sp_CountOrders").expect("scalar should succeed"), None);
    assert_eq!(
        service.data_access().calls,
        vec![Call::Execute {
            procedure: "sp_CountOrders".to_string(),
            scalar: true,
            id_return_name: String::new(),
        }]
    );
}

#[test]
fn scalar_returns_the_raw_value_unconverted() {
    let mut data = RecordingDataAccess::default();
    data.scalar_value = Value::from("12");
    let mut service = ProcedureService::new(data);

    assert_eq!(
        service.scalar("sp_CountOrders").expect("scalar should succeed"),
        Some(Value::Text("12".to_string()))
    );
}

#[test]
fn scalar_does_not_apply_rows_affected_policy() {
    let mut data = RecordingDataAccess::affecting(0);
    data.scalar_value = Value::Integer(0);
    let mut service = ProcedureService::new(data);

    assert_eq!(
        service.scalar("sp_CountOrders").expect("scalar should succeed"),
        Some(Value::Integer(0))
    );
}

#[test]
fn pass_to_class_reprojects_through_the_service() {
    let service = ProcedureService::new(RecordingDataAccess::default());
    let customer = Customer {
        id: Some(5),
        name: Some("Acme".to_string()),
        status: Some(CustomerStatus::Suspended),
        credit_limit: Some(100.0),
        vip: Some(true),
    };

    let summary: CustomerSummary = service
        .pass_to_class(Some(&customer))
        .expect("projection should succeed");

    assert_eq!(
        summary,
        CustomerSummary {
            id: Some(5),
            name: Some("Acme".to_string()),
            order_count: None,
        }
    );
    assert!(service.data_access().calls.is_empty());
}
