use airpods_sanity::audio::{Device, Role};
use airpods_sanity::priority::{Decision, NoActionReason, ReconciliationEngine, SwitchAction};
use airpods_sanity::system::{DeviceCatalog, MockDeviceCatalog};

mod test_utils;
use test_utils::{DeviceBuilder, PreferencesBuilder, scenarios};

fn output(id: u32, name: &str) -> Device {
    DeviceBuilder::new().id(id).name(name).output().build()
}

fn input(id: u32, name: &str) -> Device {
    DeviceBuilder::new().id(id).name(name).input().build()
}

/// Run an output decision and apply it to the catalog, like one pass would
fn apply_output_pass(engine: &ReconciliationEngine, catalog: &MockDeviceCatalog) -> Decision {
    let outputs = catalog.list_devices(Role::Output).unwrap();
    let decision = engine.select_output_device(&outputs);
    if let Decision::Switch(action) = &decision {
        catalog
            .set_default_device(action.role(), action.device().id)
            .unwrap();
    }
    decision
}

fn apply_input_pass(engine: &ReconciliationEngine, catalog: &MockDeviceCatalog) -> Decision {
    let current_input = catalog.default_device(Role::Input).unwrap();
    let current_output = catalog.default_device(Role::Output).unwrap();
    let inputs = catalog.list_devices(Role::Input).unwrap();
    let decision =
        engine.select_input_device(current_input.as_ref(), current_output.as_ref(), &inputs);
    if let Decision::Switch(action) = &decision {
        catalog
            .set_default_device(action.role(), action.device().id)
            .unwrap();
    }
    decision
}

#[cfg(test)]
mod output_selection {
    use super::*;

    #[test]
    fn test_disabled_never_switches_output() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["Studio Speakers"])
                .disabled()
                .build(),
        );
        let outputs = vec![
            output(1, "MacBook Pro Speakers").set_default(true),
            output(2, "Studio Speakers"),
        ];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::Disabled)
        );
    }

    #[test]
    fn test_first_match_already_default_is_no_action() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["Missing", "AirPods Pro", "Studio Speakers"])
                .build(),
        );
        let outputs = vec![
            output(1, "Studio Speakers"),
            output(2, "AirPods Pro").set_default(true),
        ];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::AlreadyDefault {
                name: "AirPods Pro".to_string()
            })
        );
    }

    #[test]
    fn test_first_match_not_default_is_selected() {
        // The listed speakers outrank the AirPods the system picked
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["Studio Speakers", "AirPods Pro"])
                .build(),
        );
        let outputs = vec![
            output(1, "AirPods Pro").set_default(true),
            output(2, "Studio Speakers"),
        ];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::Switch(SwitchAction::SetDefaultOutput(output(2, "Studio Speakers")))
        );
    }

    #[test]
    fn test_no_listed_device_available_leaves_default() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new().outputs(&["AirPods Pro"]).build(),
        );
        let outputs = vec![output(1, "MacBook Pro Speakers").set_default(true)];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::NoPriorityDeviceAvailable)
        );
    }

    #[test]
    fn test_empty_priority_list_is_no_action() {
        let engine = ReconciliationEngine::new(PreferencesBuilder::new().build());
        let outputs = vec![output(1, "MacBook Pro Speakers").set_default(true)];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::NoPriorityDeviceAvailable)
        );
    }

    #[test]
    fn test_name_matching_is_exact() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new().outputs(&["AirPods"]).build(),
        );
        let outputs = vec![
            output(1, "MacBook Pro Speakers").set_default(true),
            output(2, "AirPods Pro"),
        ];

        assert_eq!(
            engine.select_output_device(&outputs),
            Decision::NoAction(NoActionReason::NoPriorityDeviceAvailable)
        );
    }

    #[test]
    fn test_output_pass_is_idempotent() {
        let catalog = scenarios::laptop_catalog();
        catalog.add_device(scenarios::airpods_output().build());
        let engine = ReconciliationEngine::new(scenarios::airpods_preferences());

        assert!(matches!(apply_output_pass(&engine, &catalog), Decision::Switch(_)));
        assert_eq!(
            apply_output_pass(&engine, &catalog),
            Decision::NoAction(NoActionReason::AlreadyDefault {
                name: "AirPods Pro".to_string()
            })
        );
        assert_eq!(catalog.get_set_default_calls().len(), 1);
    }
}

#[cfg(test)]
mod input_correction {
    use super::*;

    #[test]
    fn test_airpods_microphone_replaced_by_priority_input() {
        // AirPods output active, AirPods microphone took over the input
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["AirPods Pro"])
                .inputs(&["MacBook Microphone"])
                .build(),
        );
        let current_output = output(1, "AirPods Pro").set_default(true);
        let current_input = input(2, "AirPods Pro").set_default(true);
        let inputs = vec![current_input.clone(), input(3, "MacBook Microphone")];

        assert_eq!(
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs),
            Decision::Switch(SwitchAction::SetDefaultInput(input(3, "MacBook Microphone")))
        );
    }

    #[test]
    fn test_output_not_listed_keeps_input() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["AirPods Pro"])
                .inputs(&["MacBook Pro Microphone"])
                .build(),
        );
        let current_output = output(1, "MacBook Pro Speakers").set_default(true);
        let current_input = input(2, "AirPods Pro").set_default(true);
        let inputs = vec![current_input.clone(), input(3, "MacBook Pro Microphone")];

        let decision =
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs);

        assert_eq!(
            decision,
            Decision::NoAction(NoActionReason::PriorityOutputInactive {
                current_input: "AirPods Pro".to_string()
            })
        );
        assert_eq!(decision.fallback_input_name(), Some("AirPods Pro"));
    }

    #[test]
    fn test_acceptable_input_updates_fallback() {
        let engine = ReconciliationEngine::new(scenarios::airpods_preferences());
        let current_output = output(1, "AirPods Pro").set_default(true);
        let current_input = input(2, "Shure MV7").set_default(true);

        let decision =
            engine.select_input_device(Some(&current_input), Some(&current_output), &[]);

        assert_eq!(
            decision,
            Decision::NoAction(NoActionReason::InputAcceptable {
                current_input: "Shure MV7".to_string()
            })
        );
        assert_eq!(decision.fallback_input_name(), Some("Shure MV7"));
    }

    #[test]
    fn test_first_available_priority_input_wins() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["AirPods Pro"])
                .inputs(&["Shure MV7", "USB Mic", "MacBook Pro Microphone"])
                .build(),
        );
        let current_output = output(1, "AirPods Pro").set_default(true);
        let current_input = input(2, "AirPods Pro").set_default(true);
        let inputs = vec![
            current_input.clone(),
            input(3, "MacBook Pro Microphone"),
            input(4, "USB Mic"),
        ];

        assert_eq!(
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs),
            Decision::Switch(SwitchAction::SetDefaultInput(input(4, "USB Mic")))
        );
    }

    #[test]
    fn test_no_priority_input_available() {
        let engine = ReconciliationEngine::new(scenarios::airpods_preferences());
        let current_output = output(1, "AirPods Pro").set_default(true);
        let current_input = input(2, "AirPods Pro").set_default(true);
        let inputs = vec![current_input.clone()];

        let decision =
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs);

        assert_eq!(
            decision,
            Decision::NoAction(NoActionReason::NoCorrectionAvailable {
                current_input: "AirPods Pro".to_string()
            })
        );
        assert_eq!(decision.fallback_input_name(), None);
    }

    #[test]
    fn test_disabled_never_corrects_input() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["AirPods Pro"])
                .inputs(&["MacBook Pro Microphone"])
                .disabled()
                .build(),
        );
        let current_output = output(1, "AirPods Pro").set_default(true);
        let current_input = input(2, "AirPods Pro").set_default(true);
        let inputs = vec![current_input.clone(), input(3, "MacBook Pro Microphone")];

        assert_eq!(
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs),
            Decision::NoAction(NoActionReason::Disabled)
        );
    }

    #[test]
    fn test_name_in_both_lists_is_still_avoided_as_input() {
        // The output list doubles as the list of microphones to avoid. A name
        // listed as both a priority output and a priority input is therefore
        // corrected away from whenever a different priority input is present.
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["Studio Headset"])
                .inputs(&["MacBook Pro Microphone", "Studio Headset"])
                .build(),
        );
        let current_output = output(1, "Studio Headset").set_default(true);
        let current_input = input(2, "Studio Headset").set_default(true);
        let inputs = vec![current_input.clone(), input(3, "MacBook Pro Microphone")];

        assert_eq!(
            engine.select_input_device(Some(&current_input), Some(&current_output), &inputs),
            Decision::Switch(SwitchAction::SetDefaultInput(input(
                3,
                "MacBook Pro Microphone"
            )))
        );
    }

    #[test]
    fn test_input_pass_is_idempotent() {
        let catalog = scenarios::airpods_took_over_catalog();
        let engine = ReconciliationEngine::new(scenarios::airpods_preferences());

        assert!(matches!(apply_input_pass(&engine, &catalog), Decision::Switch(_)));
        assert_eq!(
            apply_input_pass(&engine, &catalog),
            Decision::NoAction(NoActionReason::InputAcceptable {
                current_input: "MacBook Pro Microphone".to_string()
            })
        );
        assert_eq!(
            catalog.get_set_default_calls(),
            vec![(Role::Input, airpods_sanity::DeviceId(scenarios::MAC_MIC))]
        );
    }
}

#[cfg(test)]
mod enabled_flag {
    use super::*;

    #[test]
    fn test_disabled_gates_both_functions() {
        let engine = ReconciliationEngine::new(
            PreferencesBuilder::new()
                .outputs(&["Studio Speakers", "AirPods Pro"])
                .inputs(&["MacBook Pro Microphone"])
                .disabled()
                .build(),
        );
        let catalog = scenarios::airpods_took_over_catalog();
        catalog.add_device(output(scenarios::STUDIO_SPEAKERS, "Studio Speakers"));

        assert_eq!(
            apply_output_pass(&engine, &catalog),
            Decision::NoAction(NoActionReason::Disabled)
        );
        assert_eq!(
            apply_input_pass(&engine, &catalog),
            Decision::NoAction(NoActionReason::Disabled)
        );
        assert!(catalog.get_set_default_calls().is_empty());
    }
}
