use crate::todo_store::{Priority, Todo, User};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const REMINDER_SUBJECT: &str = "Todo Reminder";

/// A rendered message, ready for a [`super::NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Snapshot of the fields a reminder shows, taken at fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    pub recipient: String,
    pub username: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
}

impl ReminderNotification {
    pub fn new(todo: &Todo, user: &User) -> Self {
        Self {
            recipient: user.email.clone(),
            username: user.username.clone(),
            title: todo.title.clone(),
            description: todo.description.clone(),
            due_date: todo.due_date,
            priority: todo.priority,
        }
    }

    /// Due date as shown to users, MM-DD-YYYY.
    pub fn formatted_due_date(&self) -> Option<String> {
        self.due_date.map(|d| d.format("%m-%d-%Y").to_string())
    }

    pub fn render(&self) -> OutgoingMessage {
        OutgoingMessage {
            to: self.recipient.clone(),
            subject: REMINDER_SUBJECT.to_string(),
            body: self.render_html(),
        }
    }

    fn render_html(&self) -> String {
        let mut content = format!(
            "<h1>{},</h1>\n<h2>This is a reminder for your todo item:</h2>\n<h1><u>{}</u></h1>\n",
            escape_html(&self.username),
            escape_html(&self.title)
        );
        if let Some(description) = &self.description {
            content.push_str(&format!("<h3>{}</h3>\n", escape_html(description)));
        }
        if let Some(due) = self.formatted_due_date() {
            content.push_str(&format!("<h3>Due Date: {}</h3>\n", due));
        }
        content.push_str(&format!("<h3>Priority: {}</h3>\n", self.priority));

        format!(
            "<html>\n<body>\n<div class=\"container\">\n<div class=\"header\"><h1>{}</h1></div>\n<div class=\"content\">\n{}</div>\n</div>\n</body>\n</html>\n",
            REMINDER_SUBJECT, content
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
