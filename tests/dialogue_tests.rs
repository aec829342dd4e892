use pdfbot::dialogue::{
    normalize_optional_password, parse_default_password, validate_tag, DialogueState, Target,
    Wizard, WizardKind, WizardOutcome, WizardStage,
};
use pdfbot::errors::WizardError;
use pdfbot::pages::PageSelection;
use pdfbot::pipeline::{FullProcessRequest, LockChoice, Operation};

fn expect_continue(outcome: Result<WizardOutcome, WizardError>) -> Wizard {
    match outcome.unwrap() {
        WizardOutcome::Continue(wizard) => wizard,
        other => panic!("expected another question, got {other:?}"),
    }
}

fn expect_finished(outcome: Result<WizardOutcome, WizardError>) -> (Target, Operation) {
    match outcome.unwrap() {
        WizardOutcome::Finished { target, operation } => (target, operation),
        other => panic!("expected a finished wizard, got {other:?}"),
    }
}

/// Full process walks through password, pages and lock
#[test]
fn test_full_process_wizard_flow() {
    let wizard = Wizard::start(WizardKind::FullProcess, Target::Single);
    assert_eq!(wizard.stage, WizardStage::UnlockPassword);
    assert_eq!(wizard.prompt_key(), "prompt-optional-unlock-password");
    assert!(wizard.expects_secret());

    let wizard = expect_continue(wizard.advance("none"));
    assert!(wizard.on_pages_stage());
    assert!(!wizard.expects_secret());

    let wizard = expect_continue(wizard.advance("1,3-5"));
    assert_eq!(wizard.prompt_key(), "prompt-lock-password");

    let (target, operation) = expect_finished(wizard.advance("skip"));
    assert_eq!(target, Target::Single);
    assert_eq!(
        operation,
        Operation::FullProcess(FullProcessRequest {
            unlock_password: None,
            pages: PageSelection::List(vec![1, 3, 4, 5]),
            lock: LockChoice::Skip,
        })
    );
}

#[test]
fn test_full_process_wizard_keeps_passwords() {
    let wizard = Wizard::start(WizardKind::FullProcess, Target::Batch);
    let wizard = expect_continue(wizard.advance("open-sesame"));
    let wizard = expect_continue(wizard.advance("no"));

    let (target, operation) = expect_finished(wizard.advance("default"));
    assert_eq!(target, Target::Batch);
    assert_eq!(
        operation,
        Operation::FullProcess(FullProcessRequest {
            unlock_password: Some("open-sesame".to_string()),
            pages: PageSelection::none(),
            lock: LockChoice::UseDefault,
        })
    );
}

#[test]
fn test_unlock_wizard_requires_password() {
    let wizard = Wizard::start(WizardKind::Unlock, Target::Single);
    assert_eq!(wizard.prompt_key(), "prompt-unlock-password");

    assert_eq!(wizard.advance("   "), Err(WizardError::EmptyInput));

    let (_, operation) = expect_finished(wizard.advance(" secret "));
    assert_eq!(
        operation,
        Operation::Unlock {
            password: "secret".to_string()
        }
    );
}

#[test]
fn test_remove_pages_wizard_starts_on_pages() {
    let wizard = Wizard::start(WizardKind::RemovePages, Target::Single);
    assert!(wizard.on_pages_stage());
    assert_eq!(wizard.prompt_key(), "prompt-pages");

    assert_eq!(wizard.advance("none"), Err(WizardError::NoValidPages));
    assert_eq!(wizard.advance("1,,x"), Err(WizardError::InvalidPageFormat));

    let (_, operation) = expect_finished(wizard.advance("2-3"));
    assert_eq!(
        operation,
        Operation::RemovePages {
            pages: PageSelection::List(vec![2, 3])
        }
    );
}

#[test]
fn test_quick_pick_only_on_pages_stage() {
    let unlock_first = Wizard::start(WizardKind::Both, Target::Single);
    assert!(unlock_first.select_pages(PageSelection::First).is_none());

    let wizard = expect_continue(unlock_first.advance("pw"));
    let (_, operation) = expect_finished(wizard.select_pages(PageSelection::Last).unwrap());
    assert_eq!(
        operation,
        Operation::Both {
            unlock_password: Some("pw".to_string()),
            pages: PageSelection::Last,
        }
    );
}

#[test]
fn test_dialogue_state_labels() {
    assert!(DialogueState::default().is_idle());
    assert_eq!(DialogueState::AwaitingTag.label(), "awaiting_tag");

    let wizard = Wizard::start(WizardKind::RemovePages, Target::Single);
    assert_eq!(DialogueState::Wizard(wizard).label(), "awaiting_pages");
}

/// Dialogue states survive a serde_json round trip
#[test]
fn test_dialogue_state_serialization() {
    let state = DialogueState::Wizard(Wizard {
        kind: WizardKind::FullProcess,
        target: Target::Batch,
        stage: WizardStage::LockPassword {
            unlock: None,
            pages: PageSelection::Middle,
        },
    });

    let json = serde_json::to_string(&state).unwrap();
    let restored: DialogueState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
}

#[test]
fn test_password_answers() {
    assert_eq!(normalize_optional_password("skip"), None);
    assert_eq!(normalize_optional_password(" - "), None);
    assert_eq!(normalize_optional_password(" abc "), Some("abc".to_string()));

    assert_eq!(parse_default_password("OFF"), None);
    assert_eq!(parse_default_password("hunter2"), Some("hunter2".to_string()));
}

#[test]
fn test_validate_tag() {
    assert_eq!(validate_tag("  @mychannel "), Ok("@mychannel".to_string()));
    assert_eq!(validate_tag("   "), Err("empty"));
    assert_eq!(validate_tag(&"x".repeat(65)), Err("too_long"));
}
