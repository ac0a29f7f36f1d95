//! Vocabulary of the target runtime library.
//!
//! Generated code imports the runtime crate's modules under short aliases and
//! calls only what is listed here. The runtime itself is external; this is
//! the contract the generated code is written against:
//!
//! | Alias | Module                | Items used                                              |
//! |-------|-----------------------|---------------------------------------------------------|
//! | `MD`  | `common_machine_data` | `CommonMachineData<E, S>` with `create`, `send_event`, `add_to_config`, `name`, `index`, `print`, `update_id`, `push_state(s)` (saves the current state, enters `s`), `pop_state` and the fields `self_id`, `current_state`, `execution_status`, `payload`, `tx_machine_to_config`, `rx_config_to_machine` |
//! | `M`   | `machine_index`       | `Index` (`Clone`, `Debug`) with `create_index(name, instance)`, `dummy_index()` |
//! | `MP`  | `message_passing`     | `Machine<E>`, `MachineToConfigMsg<E>`, `ConfigToMachineMsg<E>`, `ExecutionStatus` (`Copy`), `default_status()`, `random_bool()`, `random_int(n)`, `announce(e)` |
//! | `PV`  | `p_value`             | `PValue` (`DefaultVal`, `Int`, `Machine`, `NamedTuple`, `Sequence`), `to_hashmap`, `equals`, `extract_*(&self)` |
//! | `EV`  | `p_event`             | `PEvent` trait (`default()`)                            |

// ── Module aliases ───────────────────────────────────────────────────────────

pub const MOD_COMMON_DATA: (&str, &str) = ("common_machine_data", "MD");
pub const MOD_INDEX: (&str, &str) = ("machine_index", "M");
pub const MOD_MESSAGES: (&str, &str) = ("message_passing", "MP");
pub const MOD_EVENT: (&str, &str) = ("p_event", "EV");
pub const MOD_VALUE: (&str, &str) = ("p_value", "PV");

pub const MACHINE_TRAIT: &str = "PStateMachine";
pub const MACHINE_TRAIT_PATH: &str = "p_state_machine::PStateMachine";
pub const CLONABLE_PATH: &str = "p_value::Clonable";

// ── Generated scaffold names ─────────────────────────────────────────────────

pub const EVENT_TYPE: &str = "ProtocolEvent";
pub const EVENT_NAME_TYPE: &str = "ProtocolEventName";
pub const DEFAULT_EVENT: &str = "DefaultEvent";
pub const HALT_EVENT: &str = "PHalt";
pub const TEMPERATURE_TYPE: &str = "MonitorTemperature";
pub const CREATE_FN: &str = "create_new_machine";
pub const DEFAULT_FN: &str = "default_function";
pub const EXIT_FN: &str = "exit_current_state";
pub const TAKE_ENTRY_FN: &str = "take_entry_event";
pub const OBSERVE_FN: &str = "observe";
pub const COMMON_DATA: &str = "common_data";
pub const SELF_ID: &str = "self.common_data.self_id";
pub const GOTO_PAYLOAD: &str = "goto_payload";
pub const CURRENT_MACHINE: &str = "current_machine";
/// Prefix of compiler-introduced temporaries.
pub const TEMP_PREFIX: &str = "PGEN_";

// ── Tagged value union ───────────────────────────────────────────────────────

pub const VALUE_TYPE: &str = "PV::PValue";
pub const VALUE_DEFAULT: &str = "PV::PValue::DefaultVal";
pub const VALUE_INT: &str = "PV::PValue::Int";
pub const VALUE_MACHINE: &str = "PV::PValue::Machine";
pub const VALUE_NAMED_TUPLE: &str = "PV::PValue::NamedTuple";
pub const VALUE_SEQUENCE: &str = "PV::PValue::Sequence";
pub const VALUE_TO_HASHMAP: &str = "PV::PValue::to_hashmap";
pub const VALUE_EQUALS: &str = "PV::PValue::equals";

pub const EXTRACT_INT: &str = ".extract_int()";
pub const EXTRACT_MACHINE: &str = ".extract_machine()";
pub const EXTRACT_NAMED_TUPLE: &str = ".extract_namedtuple()";
pub const EXTRACT_SEQUENCE: &str = ".extract_sequence()";

// ── Machine identity ─────────────────────────────────────────────────────────

pub const INDEX_TYPE: &str = "M::Index";
pub const INDEX_DUMMY: &str = "M::Index::dummy_index()";

// ── Execution status & coordinator protocol ──────────────────────────────────

pub const STATUS_DEFAULT: &str = "MP::default_status()";
pub const STATUS_CONTINUE: &str = "MP::ExecutionStatus::CanExecuteFurther";
pub const STATUS_TERMINATED: &str = "MP::ExecutionStatus::Terminated";
pub const MSG_EXECUTE_REQUEST: &str = "MP::ConfigToMachineMsg::ExecuteRequest";
pub const MSG_EXECUTE_RESPONSE: &str = "MP::MachineToConfigMsg::ExecuteResponse";
pub const MSG_CREATE_REQUEST: &str = "MP::MachineToConfigMsg::CreateMachineRequest";
pub const MSG_CREATE_RESPONSE: &str = "MP::ConfigToMachineMsg::CreateMachineResponse";

// ── Nondeterminism & broadcast ───────────────────────────────────────────────

pub const RANDOM_BOOL: &str = "MP::random_bool()";
pub const RANDOM_INT: &str = "MP::random_int";
pub const ANNOUNCE: &str = "MP::announce";

/// The event-name variant for an event name.
pub fn event_variant(name: &str) -> String {
    format!("{EVENT_NAME_TYPE}::{name}")
}

/// An event record literal.
pub fn event_literal(name_expr: &str, payload_expr: &str) -> String {
    format!("{EVENT_TYPE} {{ name: {name_expr}, payload: {payload_expr} }}")
}

/// The synthetic default event carrying `payload_expr`.
pub fn default_event(payload_expr: &str) -> String {
    event_literal(&event_variant(DEFAULT_EVENT), payload_expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_event_literal() {
        assert_eq!(
            default_event(VALUE_DEFAULT),
            "ProtocolEvent { name: ProtocolEventName::DefaultEvent, payload: PV::PValue::DefaultVal }"
        );
    }
}
