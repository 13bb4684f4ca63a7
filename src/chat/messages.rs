pub const START_TEXT: &str = "Hi! Welcome 👋\n\
To add a reminder, send /remind\n\
For instructions, send /help\n\
For information about the bot, send /info";

pub const HELP_TEXT: &str = "Here is how to use me 😊\n\
/remind - add a reminder (example: /remind 18:45)\n\
/myreminders - list your reminders\n\
/delreminder - delete a reminder (example: /delreminder 1)\n\
/clearreminders - delete all your reminders\n\
/cancel - stop adding a reminder";

pub const INFO_TEXT: &str = "I'm a reminder bot. Tell me a time and some text and I'll send it back to you when the time comes 😊\n\
See the commands with /help";

pub const ASK_TIME_TEXT: &str = "When should I remind you? Send HH:MM (today) or DD.MM HH:MM (another day)\n\
Examples: 18:45, 25.08 09:30";

pub const ASK_TEXT_TEXT: &str = "Okay, what should I remind you about? 👍";

pub const BAD_TIME_TEXT: &str =
    "I didn't get that... Send the time as HH:MM or DD.MM HH:MM, or start over with /remind";

pub const SESSION_LOST_TEXT: &str = "Something broke. Send /remind and try again";

pub const NO_REMINDERS_TEXT: &str = "Nothing yet... you have no reminders";

pub const LIST_FOOTER_TEXT: &str =
    "\nDelete a reminder with /delreminder [id], or all of them with /clearreminders";

pub const DELETE_USAGE_TEXT: &str = "Send the ID as a number. Example: /delreminder 1";

pub const NOT_FOUND_TEXT: &str = "Couldn't find that reminder";

pub const CLEARED_TEXT: &str = "Done, deleted all your reminders";

pub const CANCELLED_TEXT: &str = "Okay, cancelled";

pub const IDLE_HINT: &str = "Send /remind to add a reminder or /help to see what I can do.";

pub const STORAGE_FAILURE_TEXT: &str = "Something went wrong on my side. Please try again later.";
