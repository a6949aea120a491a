//! User-facing texts and the chat system prompt.

/// System prompt for every chat turn.
pub const MAIN_PROMPT: &str = "\
Ты — ассистент клуба осознанных знакомств YouMatch. Ты помогаешь людям, \
которые хотят построить серьезные и гармоничные отношения.

Правила:
- Отвечай на русском языке, тепло и по делу, не длиннее нескольких абзацев.
- Опирайся на материалы YouMatch, приведенные в контексте. Если ответа в них нет, \
честно скажи об этом и предложи записаться на персональный разбор.
- Не ставь диагнозов и не давай медицинских или юридических советов.
- Не обещай конкретных результатов и сроков.
- Если пользователь спрашивает о стоимости или условиях программы, предложи \
обсудить это на бесплатной встрече с экспертом (/bookcall).";

/// Sent on `/start`.
pub const STEP_WELCOME: &str = "\
Здравствуйте! Я ассистент YouMatch 👋

Мы помогаем людям найти партнера для серьезных отношений: разбираемся, что \
мешает встрече, и сопровождаем на всем пути знакомства.

Задайте мне любой вопрос о YouMatch, заполните короткую анкету (/profile) \
или сразу запишитесь на интервью с экспертом.";

/// Sent on `/profile` above the "fill in" button.
pub const STEP_1: &str = "\
Ответьте, пожалуйста, на 6 коротких вопросов. Это займет пару минут и поможет \
эксперту подготовиться к вашей персональной встрече.";

/// Sent when the questionnaire is complete.
pub const STEP_RESULT: &str = "\
Спасибо за ответы! 🙏

Мы подготовили для вас гайд «Проводник к осознанным и гармоничным отношениям». \
А чтобы разобрать именно вашу ситуацию, запишитесь на бесплатный персональный \
разбор с экспертом YouMatch.";

/// Sent on `/info`.
pub const ABOUT_YOUMATCH: &str = "\
YouMatch — клуб осознанных знакомств для тех, кто готов к серьезным отношениям.

Мы не просто знакомим: вместе с психологом вы разбираетесь в своих ожиданиях, \
а персональный менеджер подбирает людей, близких вам по ценностям.

Подробнее о подходе рассказывает основатель YouMatch в интервью.";

/// Sent on `/help`.
pub const HELP_TEXT: &str = "\
Если у вас возник вопрос или техническая сложность, напишите вашему \
персональному ассистенту — мы ответим в ближайшее время.";

/// Sent on `/menu`.
pub const COMMANDS_LIST: &str = "\
Доступные команды:
/start — начать работу
/bookcall — записаться на звонок
/profile — заполнить анкету
/help — связаться с экспертом
/info — подробнее о YouMatch
/menu — список команд";

/// Sent on `/bookcall` above the booking button.
pub const BOOK_CALL_PROMPT: &str = "Пожалуйста, выберите удобное время для звонка:";

/// Sent when a chat turn fails.
pub const GENERIC_FAILURE: &str = "Произошла ошибка обработки запроса";

/// Sent when the Q2 answer is not one of the two choices.
pub const CHOOSE_YES_OR_NO: &str = "Пожалуйста, выберите «Да» или «Нет».";

/// Reminder A: did the user book a meeting.
pub const FOLLOWUP_FIRST: &str = "Подскажите, удалось ли вам записаться на встречу?";

/// Reminder B: single call to action.
pub const FOLLOWUP_SECOND: &str = "\
К сожалению, я так и не получила от вас ответа. Бесплатная экспресс-диагностика \
доступна только для ограниченного числа желающих. У нас осталось всего 7 мест.

Актуально это для вас сейчас?";

/// Reply to "yes, I booked".
pub const FOLLOWUP_YES_REPLY: &str = "\
Отлично! На вашу почту была отправлена ссылка, по которой будет проходить \
встреча 🙂 Поздравляем вас с первым шагом на пути к здоровым отношениям!";

/// Reply to "no, not booked".
pub const FOLLOWUP_NO_REPLY: &str = "\
Обратите внимание, бесплатный разбор доступен для ограниченного числа желающих. \
У нас осталось всего 10 мест.
Если у вас технические сложности нажмите /help для связи с вашим персональным ассистентом.";

/// Text reply for the `book_call` button.
pub fn book_call_link(booking_url: &str) -> String {
    format!(
        "Отлично! Для записи выберите удобное время через наш сервис: {booking_url}\n\n\
         Ждем вас на звонке!"
    )
}

// Button labels.
pub const BUTTON_BOOK_INTERVIEW: &str = "Записаться на интервью";
pub const BUTTON_BOOK_CALL: &str = "Записаться на звонок";
pub const BUTTON_PERSONAL_REVIEW: &str = "Записаться на персональный разбор";
pub const BUTTON_PERSONAL_REVIEW_YES: &str = "Да, хочу записаться на персональный разбор";
pub const BUTTON_FILL_PROFILE: &str = "Заполнить анкету";
pub const BUTTON_CONTACT_EXPERT: &str = "Связаться с экспертом";
pub const BUTTON_FOUNDER_INTERVIEW: &str = "Интервью основателя YouMatch";
pub const BUTTON_YES: &str = "Да";
pub const BUTTON_NO: &str = "Нет";
