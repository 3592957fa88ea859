//! Built-in Turkish pre-router rules
//!
//! Order matters: destructive phrasings are checked first so a sentence such
//! as "merhaba, toplantıyı sil" never gets a canned greeting.

use super::PreRouterRule;
use crate::error::Result;
use crate::types::Route;

/// The default rule list
pub fn default_rules() -> Result<Vec<PreRouterRule>> {
    Ok(vec![
        // verb forms only, so "silgi", "silver" and "kaldırım" stay harmless
        PreRouterRule::new(
            "destructive",
            concat!(
                r"\b(?:",
                r"sil(?:er|ersin|in|insin|indi|mek|me|meli|ebilir|ebilirsin|elim|eyim|sene|sin|di|dim|din|ecek)?",
                r"|kaldır(?:ır|ırsın|ın|ılsın|mak|abilir|abilirsin|alım|ayım|sana|sın|dı|dım|acak)?",
                r"|iptal\s+et\w*|delete|remove",
                r")\b",
            ),
            Route::Unknown,
        )?
        .with_intent("destructive")
        .with_confidence(0.0)
        .destructive(),
        PreRouterRule::new("wake", r"^(?:hey\s+)?bantz[\s?!.,]*$", Route::Smalltalk)?
            .with_intent("wake")
            .with_reply("Buradayım, dinliyorum."),
        PreRouterRule::new(
            "greeting",
            r"^(?:hey\s+)?(?:bantz[\s,!.]*)?(?:(?:merhaba|selamlar|selam|günaydın|iyi\s+akşamlar|iyi\s+geceler)[\s,!.]*(?:nasılsın|naber|ne\s+haber)?|nasılsın|naber|ne\s+haber)[\s?!.]*$",
            Route::Smalltalk,
        )?
        .with_intent("greeting")
        .with_reply("İyiyim, teşekkürler! Sana nasıl yardımcı olabilirim?"),
        PreRouterRule::new(
            "thanks",
            r"^(?:çok\s+)?(?:teşekkürler|teşekkür\s+ederim|sağ\s?ol(?:un)?|eyvallah|thanks|thank\s+you)[\s!.]*$",
            Route::Smalltalk,
        )?
        .with_intent("thanks")
        .with_reply("Rica ederim!"),
        PreRouterRule::new(
            "time",
            r"^(?:bantz[\s,]*)?(?:saat\s+kaç|şu\s+an\s+saat\s+kaç|bugün\s+günlerden\s+ne)[\s?!.]*$",
            Route::System,
        )?
        .with_intent("time")
        .with_tool_plan(&["system.time"]),
    ])
}
