//! Router prompt
//!
//! The model must answer with a single JSON object. Dialog summary and
//! memory go in a separate user message ahead of the utterance so the
//! system prompt stays cacheable.

use crate::types::Route;
use bantz_llm::Message;

const SYSTEM_PROMPT: &str = r#"Sen Bantz'ın niyet yönlendiricisisin. Kullanıcının cümlesini analiz et ve SADECE tek bir JSON nesnesi döndür, başka hiçbir şey yazma.

Alanlar:
- "route": {routes}
- "intent": alt niyet (ör. "list_events", "create_event", "delete_event", "list_messages", "send")
- "slots": çıkarılan değerler (ör. {"date": "2024-05-01", "time": "10:00", "title": "...", "to": "..."})
- "confidence": 0 ile 1 arasında güven
- "tool_plan": çalıştırılacak araç adlarının sıralı listesi; sadece şu araçları kullan: {tools}
- "assistant_reply": yalnızca smalltalk için kısa Türkçe yanıt, aksi halde boş
- "ask_user": eksik bilgi varsa true
- "question": ask_user true ise sorulacak Türkçe soru
- "requires_confirmation": silme, gönderme gibi geri alınamaz işlemlerde true
- "confirmation_prompt": onay için Türkçe soru

Kurallar:
- smalltalk için tool_plan boş olmalı.
- Emin değilsen confidence değerini düşük tut ve soru sor.
- Saat, tarih veya sayı uydurma."#;

/// Build the router messages
#[must_use]
pub fn build_messages(
    catalog: &[String],
    user_input: &str,
    dialog_summary: &str,
    retrieved_memory: &[String],
) -> Vec<Message> {
    let routes = Route::ALL
        .iter()
        .map(Route::as_str)
        .collect::<Vec<_>>()
        .join(" | ");
    let tools = if catalog.is_empty() {
        "(araç yok)".to_string()
    } else {
        catalog.join(", ")
    };
    let system = SYSTEM_PROMPT
        .replace("{routes}", &routes)
        .replace("{tools}", &tools);

    let mut messages = vec![Message::system(system)];

    let mut context = String::new();
    if !dialog_summary.trim().is_empty() {
        context.push_str("Konuşma özeti:\n");
        context.push_str(dialog_summary.trim());
        context.push('\n');
    }
    if !retrieved_memory.is_empty() {
        context.push_str("Hatırlananlar:\n");
        for snippet in retrieved_memory {
            context.push_str("- ");
            context.push_str(snippet);
            context.push('\n');
        }
    }
    if !context.is_empty() {
        messages.push(Message::user(context.trim_end().to_string()));
    }

    messages.push(Message::user(user_input.to_string()));
    messages
}
