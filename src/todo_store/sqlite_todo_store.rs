use super::models::{NewTodo, Priority, Todo, TodoFilter, User};
use super::schema::TODO_VERSIONED_SCHEMAS;
use super::{TodoRepository, TodoStore};
use crate::reminders::ReminderTime;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

const TODO_COLUMNS: &str =
    "id, user_id, title, description, due_date, priority, completed, reminder, reminder_time";

pub struct SqliteTodoStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTodoStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path.as_ref(), TODO_VERSIONED_SCHEMAS, "todo")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_date(date: &NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    fn row_to_todo(row: &rusqlite::Row) -> rusqlite::Result<Todo> {
        let id: i64 = row.get("id")?;

        let due_date_str: Option<String> = row.get("due_date")?;
        let due_date = due_date_str.and_then(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| warn!("Todo {} has malformed due_date {:?}: {}", id, s, e))
                .ok()
        });

        let priority_str: String = row.get("priority")?;
        let priority = Priority::parse(&priority_str).unwrap_or_default();

        let reminder_time_str: Option<String> = row.get("reminder_time")?;
        let reminder_time = reminder_time_str.and_then(|s| {
            ReminderTime::from_hhmm(&s)
                .map_err(|e| warn!("Todo {} has malformed reminder_time {:?}: {}", id, s, e))
                .ok()
        });

        Ok(Todo {
            id,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            due_date,
            priority,
            completed: row.get::<_, i64>("completed")? != 0,
            reminder: row.get::<_, i64>("reminder")? != 0,
            reminder_time,
        })
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
        })
    }
}

impl TodoRepository for SqliteTodoStore {
    fn get_todo(&self, todo_id: i64) -> Result<Option<Todo>> {
        let conn = self.conn.lock().unwrap();
        let todo = conn
            .query_row(
                &format!("SELECT {} FROM todos WHERE id = ?1", TODO_COLUMNS),
                params![todo_id],
                Self::row_to_todo,
            )
            .optional()?;
        Ok(todo)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                "SELECT id, username, email FROM users WHERE id = ?1",
                params![user_id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn list_due_reminders(&self, date: NaiveDate) -> Result<Vec<Todo>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM todos WHERE due_date = ?1 AND reminder = 1 ORDER BY id",
            TODO_COLUMNS
        ))?;
        let todos = stmt
            .query_map(params![Self::format_date(&date)], Self::row_to_todo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(todos)
    }
}

impl TodoStore for SqliteTodoStore {
    fn create_user(&self, username: &str, email: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (username, email) VALUES (?1, ?2)",
            params![username, email],
        )
        .with_context(|| format!("Failed to create user {}", username))?;
        Ok(conn.last_insert_rowid())
    }

    fn update_user_email(&self, user_id: i64, email: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE users SET email = ?1 WHERE id = ?2",
            params![email, user_id],
        )?;
        Ok(updated > 0)
    }

    fn delete_user(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        Ok(deleted > 0)
    }

    fn create_todo(&self, todo: &NewTodo) -> Result<Todo> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO todos (user_id, title, description, due_date, priority, reminder, reminder_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                todo.user_id,
                todo.title,
                todo.description,
                todo.due_date.as_ref().map(Self::format_date),
                todo.priority.as_str(),
                todo.reminder as i64,
                todo.reminder_time.map(|t| t.to_hhmm()),
            ],
        )
        .with_context(|| format!("Failed to create todo for user {}", todo.user_id))?;

        Ok(Todo {
            id: conn.last_insert_rowid(),
            user_id: todo.user_id,
            title: todo.title.clone(),
            description: todo.description.clone(),
            due_date: todo.due_date,
            priority: todo.priority,
            completed: false,
            reminder: todo.reminder,
            reminder_time: todo.reminder_time,
        })
    }

    fn update_todo(&self, todo: &Todo) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE todos SET title = ?1, description = ?2, due_date = ?3, priority = ?4,
                completed = ?5, reminder = ?6, reminder_time = ?7
             WHERE id = ?8",
            params![
                todo.title,
                todo.description,
                todo.due_date.as_ref().map(Self::format_date),
                todo.priority.as_str(),
                todo.completed as i64,
                todo.reminder as i64,
                todo.reminder_time.map(|t| t.to_hhmm()),
                todo.id,
            ],
        )?;
        Ok(updated > 0)
    }

    fn delete_todo(&self, todo_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM todos WHERE id = ?1", params![todo_id])?;
        Ok(deleted > 0)
    }

    fn list_todos(&self, user_id: i64, filter: TodoFilter) -> Result<Vec<Todo>> {
        let conn = self.conn.lock().unwrap();
        let completed_clause = match filter {
            TodoFilter::All => "",
            TodoFilter::Pending => " AND completed = 0",
            TodoFilter::Complete => " AND completed = 1",
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM todos WHERE user_id = ?1{} ORDER BY id",
            TODO_COLUMNS, completed_clause
        ))?;
        let todos = stmt
            .query_map(params![user_id], Self::row_to_todo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(todos)
    }

    fn delete_user_todos(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM todos WHERE user_id = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        tx.execute("DELETE FROM todos WHERE user_id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(ids)
    }
}
