use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::errors::AppError;
use crate::models::{
    BookingStatus, InboundMessage, ListMenu, ListRow, NewBooking, OutboundMessage, ServiceKind,
    Session, Stage,
};
use crate::services::slots::upcoming_slots;
use crate::state::AppState;

pub const MAX_NOTE_CHARS: usize = 200;
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 100;

const GREETING: &str = "👋 Olá! Para agendar, preciso do seu nome.";
const INVALID_NAME: &str = "Por favor, envie um nome válido (mínimo 2 caracteres).";
const NO_SLOTS_AHEAD: &str = "Desculpe, não há horários disponíveis nos próximos dias.";
const NO_SLOTS_NOW: &str = "Sem horários disponíveis no momento. Tente novamente depois.";
const INVALID_CHOICE: &str = "Por favor, responda com o número do horário escolhido.";
const SLOT_TAKEN: &str = "Esse horário já foi agendado. Por favor, escolha outro.";
const SLOT_ELAPSED: &str = "Esse horário já passou. Por favor, escolha outro.";
const USE_THE_LIST: &str = "Selecione um serviço usando a lista enviada.";
const INVALID_SERVICE: &str = "Serviço inválido. Por favor, escolha novamente.";
const ASK_NOTE: &str = "Alguma observação para o agendamento? Responda 'Não' para nenhuma.";
const INVALID_NOTE: &str =
    "Observação inválida. Por favor, envie uma observação menor que 200 caracteres ou 'Não'.";
const BOOKING_RACED: &str =
    "Desculpe, esse horário acabou de ser reservado por outra pessoa. Escolha um novo horário:";
const APOLOGY: &str = "Desculpe, tivemos um problema. Tente novamente em instantes.";
const START_OVER: &str = "Algo deu errado com o seu agendamento. Envie uma nova mensagem para recomeçar.";

/// Advances the sender's booking conversation by one message and delivers the
/// replies, in order. The sender's session guard is held until every reply has
/// gone out, so a later message from the same phone cannot overtake them.
/// Returns what was handed to the messaging provider.
pub async fn process_message(
    state: &Arc<AppState>,
    from_phone: &str,
    message: InboundMessage,
) -> Vec<OutboundMessage> {
    let now = state.clock.now();
    let mut slot = state.sessions.checkout(from_phone, now).await;

    let replies = match step(state, &mut slot, from_phone, &message, now) {
        Ok(replies) => replies,
        Err(e) => {
            tracing::error!(error = %e, phone = from_phone, "conversation processing failed");
            vec![OutboundMessage::text(APOLOGY)]
        }
    };

    for reply in &replies {
        if let Err(e) = state.messaging.send(from_phone, reply).await {
            tracing::error!(error = %e, phone = from_phone, "failed to send reply");
        }
    }

    drop(slot);
    replies
}

fn step(
    state: &AppState,
    slot: &mut Option<Session>,
    from_phone: &str,
    message: &InboundMessage,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let Some(mut session) = slot.take() else {
        *slot = Some(Session::new(from_phone, now));
        tracing::info!(phone = from_phone, "conversation started");
        return Ok(vec![OutboundMessage::text(GREETING)]);
    };

    session.last_activity = now;
    let stage_before = session.stage;

    let result = advance(state, &mut session, message, now);

    tracing::info!(
        phone = from_phone,
        from = stage_before.as_str(),
        to = session.stage.as_str(),
        "processed message"
    );

    // A failed step keeps the session where it was so the sender can retry.
    if session.stage != Stage::Done {
        *slot = Some(session);
    }

    result
}

fn advance(
    state: &AppState,
    session: &mut Session,
    message: &InboundMessage,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<OutboundMessage>> {
    match session.stage {
        Stage::CollectingName => collect_name(state, session, message, now),
        Stage::AwaitingSlotChoice => choose_slot(state, session, message, now),
        Stage::AwaitingServiceChoice => Ok(choose_service(session, message)),
        Stage::AwaitingNote => take_note(state, session, message, now),
        Stage::Done => Ok(Vec::new()),
    }
}

fn collect_name(
    state: &AppState,
    session: &mut Session,
    message: &InboundMessage,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let Some(name) = message.text().filter(|n| is_valid_name(n)) else {
        return Ok(vec![OutboundMessage::text(INVALID_NAME)]);
    };

    session.name = Some(name.to_string());
    offer_slots(state, session, now, NO_SLOTS_AHEAD)
}

fn choose_slot(
    state: &AppState,
    session: &mut Session,
    message: &InboundMessage,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let choice = message
        .text()
        .and_then(parse_choice)
        .filter(|n| (1..=session.candidates.len()).contains(n));
    let Some(choice) = choice else {
        return Ok(vec![OutboundMessage::text(INVALID_CHOICE)]);
    };

    let instant = session.candidates[choice - 1];

    // The list may be stale by now: someone else could have booked the slot,
    // or the time could have gone by.
    let stale = if instant <= now {
        Some(SLOT_ELAPSED)
    } else if state.store.is_taken(&state.config.bot_resource_id, instant)? {
        Some(SLOT_TAKEN)
    } else {
        None
    };
    if let Some(reason) = stale {
        let mut replies = vec![OutboundMessage::text(reason)];
        replies.extend(offer_slots(state, session, now, NO_SLOTS_NOW)?);
        return Ok(replies);
    }

    session.chosen_at = Some(instant);
    session.candidates.clear();
    session.stage = Stage::AwaitingServiceChoice;
    Ok(vec![service_menu()])
}

fn choose_service(session: &mut Session, message: &InboundMessage) -> Vec<OutboundMessage> {
    let id = match message {
        InboundMessage::ListReply { id, .. } => id.as_str(),
        InboundMessage::Text(body) => body.trim(),
        InboundMessage::Unsupported(_) => return vec![OutboundMessage::text(USE_THE_LIST)],
    };

    let Some(kind) = ServiceKind::from_id(id) else {
        let reply = if message.list_reply_id().is_some() {
            INVALID_SERVICE
        } else {
            USE_THE_LIST
        };
        return vec![OutboundMessage::text(reply)];
    };

    session.service = Some(kind);
    session.stage = Stage::AwaitingNote;
    vec![OutboundMessage::text(ASK_NOTE)]
}

fn take_note(
    state: &AppState,
    session: &mut Session,
    message: &InboundMessage,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let note = match message.text() {
        Some(raw) if is_negative(raw) => String::new(),
        Some(raw) if raw.chars().count() <= MAX_NOTE_CHARS => raw.to_string(),
        _ => return Ok(vec![OutboundMessage::text(INVALID_NOTE)]),
    };

    let (Some(name), Some(scheduled_at), Some(service)) =
        (session.name.clone(), session.chosen_at, session.service)
    else {
        tracing::error!(phone = %session.phone, "session reached note stage with missing fields");
        session.stage = Stage::Done;
        return Ok(vec![OutboundMessage::text(START_OVER)]);
    };

    if scheduled_at <= now {
        session.chosen_at = None;
        let mut replies = vec![OutboundMessage::text(SLOT_ELAPSED)];
        replies.extend(offer_slots(state, session, now, NO_SLOTS_NOW)?);
        return Ok(replies);
    }

    let new_booking = NewBooking {
        resource_id: state.config.bot_resource_id.clone(),
        counterparty: session.phone.clone(),
        customer_name: Some(name.clone()),
        service: Some(service.label().to_string()),
        scheduled_at,
        status: BookingStatus::Pending,
        note: (!note.is_empty()).then(|| note.clone()),
    };

    match state.store.create(new_booking, now) {
        Ok(booking) => {
            tracing::info!(phone = %session.phone, booking_id = %booking.id, "appointment requested over WhatsApp");
            session.stage = Stage::Done;
            Ok(vec![OutboundMessage::text(confirmation(
                &name,
                &session.phone,
                scheduled_at,
                service,
                &note,
            ))])
        }
        Err(AppError::Conflict) => {
            tracing::warn!(phone = %session.phone, scheduled_at = %scheduled_at, "slot taken between offer and creation");
            session.chosen_at = None;
            let mut replies = vec![OutboundMessage::text(BOOKING_RACED)];
            replies.extend(offer_slots(state, session, now, NO_SLOTS_NOW)?);
            Ok(replies)
        }
        Err(e) => Err(e.into()),
    }
}

/// Recomputes candidates and moves to slot choice, or ends the conversation
/// with `exhausted` when nothing is free.
fn offer_slots(
    state: &AppState,
    session: &mut Session,
    now: NaiveDateTime,
    exhausted: &str,
) -> anyhow::Result<Vec<OutboundMessage>> {
    let slots = upcoming_slots(
        state.store.as_ref(),
        &state.config.bot_resource_id,
        &state.config.bot_slots,
        state.config.bot_days_ahead,
        now,
    )?;

    if slots.is_empty() {
        tracing::info!(phone = %session.phone, "no free slots to offer");
        session.candidates.clear();
        session.stage = Stage::Done;
        return Ok(vec![OutboundMessage::text(exhausted)]);
    }

    let list = slot_list(&slots);
    session.candidates = slots;
    session.stage = Stage::AwaitingSlotChoice;
    Ok(vec![OutboundMessage::text(list)])
}

fn slot_list(slots: &[NaiveDateTime]) -> String {
    let mut message = String::from(
        "📅 Escolha um dos horários disponíveis respondendo com o número correspondente:\n\n",
    );
    for (i, slot) in slots.iter().enumerate() {
        message.push_str(&format!("{}. {}\n", i + 1, format_datetime_br(slot)));
    }
    message.push_str("\nPor favor, responda apenas com o número da opção desejada.");
    message
}

fn service_menu() -> OutboundMessage {
    OutboundMessage::List(ListMenu {
        header: "🛠️ Escolha o tipo de serviço".to_string(),
        body: "Selecione o serviço de manutenção que deseja agendar:".to_string(),
        footer: "Escolha uma opção da lista.".to_string(),
        button: "Ver serviços".to_string(),
        section_title: "Tipos de serviço".to_string(),
        rows: ServiceKind::ALL
            .iter()
            .map(|kind| ListRow {
                id: kind.id().to_string(),
                title: kind.label().to_string(),
            })
            .collect(),
    })
}

fn confirmation(
    name: &str,
    phone: &str,
    scheduled_at: NaiveDateTime,
    service: ServiceKind,
    note: &str,
) -> String {
    let note = if note.is_empty() { "Nenhuma" } else { note };
    format!(
        "✅ Agendamento solicitado com sucesso!\n\n\
         👤 Nome: {name}\n\
         📞 Telefone: {phone}\n\
         📅 Data e Hora: {}\n\
         💼 Serviço: {}\n\
         📝 Observações: {note}\n\n\
         Você receberá uma confirmação em breve!",
        format_datetime_br(&scheduled_at),
        service.label(),
    )
}

pub fn format_datetime_br(dt: &NaiveDateTime) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

fn is_valid_name(name: &str) -> bool {
    (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&name.chars().count())
}

fn parse_choice(s: &str) -> Option<usize> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_negative(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "não" | "nao" | "no")
}
