//! Line-oriented console front end.
//!
//! The console owns only presentation state (current screen and task
//! filter). Everything else is read from the [`AppContext`] it is handed, and
//! before and after each command it calls [`AppContext::sync`] so session
//! changes made elsewhere (an expired token, a remote sign-out) decide which
//! screen the command runs against.
//!
//! Input is read as plain lines from any [`AsyncBufRead`]. Passwords are
//! therefore echoed by the terminal as typed; the console itself never
//! writes them back.

mod command;
pub mod forms;
pub mod view;

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, warn};

use crate::domain::ports::{AuthGateway, ProfileRepository, TaskRepository};
use crate::domain::{
    AppContext, Error, SignUpStatus, Task, TaskFilter, parse_priority_selection,
    parse_status_selection,
};

pub use self::command::Command;
use self::forms::{CLEAR_MARKER, LoginForm, ProfileForm, SignUpForm, TaskForm};

/// Screen currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    SignUp,
    Tasks,
    Profile,
}

impl Screen {
    /// Whether the screen belongs to the signed-in dashboard.
    pub const fn is_dashboard(self) -> bool {
        matches!(self, Self::Tasks | Self::Profile)
    }

    const fn prompt(self) -> &'static str {
        match self {
            Self::Login => "login> ",
            Self::SignUp => "signup> ",
            Self::Tasks => "tasks> ",
            Self::Profile => "profile> ",
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Self::Login => {
                "Commands: login (submit credentials), signup (create an account), help, quit"
            }
            Self::SignUp => {
                "Commands: signup (submit the form), login (back to sign in), help, quit"
            }
            Self::Tasks | Self::Profile => concat!(
                "Navigation: tasks, profile, logout, quit\n",
                "Tasks: new, edit <id>, delete <id>, refresh\n",
                "Filters: search <text>, status <all|pending|in progress|completed>, ",
                "priority <all|low|medium|high>, clear\n",
                "Account: edit-profile, refresh-session",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Interactive console over any async line source and sink.
pub struct Console<R, W> {
    lines: Lines<R>,
    out: W,
    screen: Screen,
    filter: TaskFilter,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            out: output,
            screen: Screen::Login,
            filter: TaskFilter::default(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    /// Give back the output sink, e.g. to inspect a captured buffer.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Read and execute commands until `quit` or end of input.
    pub async fn run<A, P, T>(&mut self, ctx: &mut AppContext<A, P, T>) -> io::Result<()>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        self.settle(ctx);
        self.render(ctx).await?;
        loop {
            self.write(self.screen.prompt()).await?;
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            ctx.sync().await;
            if self.settle(ctx) {
                self.render(ctx).await?;
            }
            let command = Command::parse(&line);
            debug!(?command, screen = ?self.screen, "console command");
            if self.dispatch(ctx, command).await? == Flow::Quit {
                break;
            }
            ctx.sync().await;
            if self.settle(ctx) {
                self.render(ctx).await?;
            }
        }
        self.out.flush().await
    }

    /// Align the screen with the session. Returns whether it changed.
    fn settle<A, P, T>(&mut self, ctx: &AppContext<A, P, T>) -> bool
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let signed_in = ctx.session().identity().is_some();
        let next = match (signed_in, self.screen.is_dashboard()) {
            (true, false) => Screen::Tasks,
            (false, true) => {
                self.filter = TaskFilter::default();
                Screen::Login
            }
            _ => self.screen,
        };
        let changed = next != self.screen;
        self.screen = next;
        changed
    }

    async fn dispatch<A, P, T>(
        &mut self,
        ctx: &mut AppContext<A, P, T>,
        command: Command,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        match (self.screen.is_dashboard(), command) {
            (_, Command::Empty) => Ok(Flow::Continue),
            (_, Command::Quit) => Ok(Flow::Quit),
            (_, Command::Help) => {
                self.line(self.screen.help()).await?;
                Ok(Flow::Continue)
            }
            (_, Command::Unknown(verb)) => {
                self.line(&format!("Unknown command: {verb} (type help)"))
                    .await?;
                Ok(Flow::Continue)
            }
            (false, command) => self.dispatch_auth(ctx, command).await,
            (true, command) => self.dispatch_dashboard(ctx, command).await,
        }
    }

    async fn dispatch_auth<A, P, T>(
        &mut self,
        ctx: &mut AppContext<A, P, T>,
        command: Command,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        match (self.screen, command) {
            (Screen::Login, Command::Login) => self.login(ctx).await,
            (Screen::SignUp, Command::SignUp) => self.sign_up(ctx).await,
            (_, Command::Login) => self.switch(ctx, Screen::Login).await,
            (_, Command::SignUp) => self.switch(ctx, Screen::SignUp).await,
            _ => {
                self.line("Sign in first (type help)").await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn dispatch_dashboard<A, P, T>(
        &mut self,
        ctx: &mut AppContext<A, P, T>,
        command: Command,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        match command {
            Command::Tasks => self.switch(ctx, Screen::Tasks).await,
            Command::Profile => self.switch(ctx, Screen::Profile).await,
            Command::New => self.create_task(ctx).await,
            Command::Edit(prefix) => self.edit_task(ctx, &prefix).await,
            Command::Delete(prefix) => self.delete_task(ctx, &prefix).await,
            Command::Search(query) => {
                self.filter.query = query;
                self.show_tasks(ctx).await
            }
            Command::Status(raw) => match parse_status_selection(&raw) {
                Ok(status) => {
                    self.filter.status = status;
                    self.show_tasks(ctx).await
                }
                Err(err) => self.notice(&err.to_string()).await,
            },
            Command::Priority(raw) => match parse_priority_selection(&raw) {
                Ok(priority) => {
                    self.filter.priority = priority;
                    self.show_tasks(ctx).await
                }
                Err(err) => self.notice(&err.to_string()).await,
            },
            Command::ClearFilters => {
                self.filter = TaskFilter::default();
                self.show_tasks(ctx).await
            }
            Command::Refresh => {
                ctx.tasks_mut().refresh_tasks().await;
                self.show_tasks(ctx).await
            }
            Command::RefreshSession => match ctx.session_mut().refresh_session().await {
                Ok(()) => self.notice("Session refreshed").await,
                Err(err) => self.failed(&err).await,
            },
            Command::EditProfile => self.edit_profile(ctx).await,
            Command::Logout => match ctx.session_mut().sign_out().await {
                Ok(()) => Ok(Flow::Continue),
                Err(err) => self.failed(&err).await,
            },
            Command::Login | Command::SignUp => self.notice("Already signed in").await,
            Command::Empty | Command::Help | Command::Quit | Command::Unknown(_) => {
                Ok(Flow::Continue)
            }
        }
    }

    async fn login<A, P, T>(&mut self, ctx: &mut AppContext<A, P, T>) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(email) = self.ask("Email").await? else {
            return Ok(Flow::Quit);
        };
        let Some(password) = self.ask("Password").await? else {
            return Ok(Flow::Quit);
        };
        let form = LoginForm { email, password };
        if let Err(errors) = form.validate() {
            return self.notice(view::field_errors(&errors).trim_end()).await;
        }
        match ctx.session_mut().sign_in(&form.email, &form.password).await {
            Ok(()) => Ok(Flow::Continue),
            Err(err) => self.failed(&err).await,
        }
    }

    async fn sign_up<A, P, T>(&mut self, ctx: &mut AppContext<A, P, T>) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(full_name) = self.ask("Full name").await? else {
            return Ok(Flow::Quit);
        };
        let Some(email) = self.ask("Email").await? else {
            return Ok(Flow::Quit);
        };
        let Some(password) = self.ask("Password").await? else {
            return Ok(Flow::Quit);
        };
        let form = SignUpForm {
            full_name,
            email,
            password,
        };
        if let Err(errors) = form.validate() {
            return self.notice(view::field_errors(&errors).trim_end()).await;
        }
        let result = ctx
            .session_mut()
            .sign_up(&form.email, &form.password, form.full_name.trim())
            .await;
        match result {
            Ok(SignUpStatus::SignedIn) => Ok(Flow::Continue),
            Ok(SignUpStatus::ConfirmationPending) => {
                self.screen = Screen::Login;
                self.notice("Account created. Confirm your email, then sign in.")
                    .await
            }
            Err(err) => self.failed(&err).await,
        }
    }

    async fn create_task<A, P, T>(&mut self, ctx: &mut AppContext<A, P, T>) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(form) = self.fill_task_form(TaskForm::default()).await? else {
            return Ok(Flow::Quit);
        };
        let draft = match form.validate() {
            Ok(draft) => draft,
            Err(errors) => return self.notice(view::field_errors(&errors).trim_end()).await,
        };
        match ctx.tasks_mut().create_task(draft).await {
            Ok(task) => {
                self.notice(&format!("Created [{}] {}", task.id.short(), task.title))
                    .await
            }
            Err(err) => self.failed(&err).await,
        }
    }

    async fn edit_task<A, P, T>(
        &mut self,
        ctx: &mut AppContext<A, P, T>,
        prefix: &str,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(task) = self.resolve(ctx, "edit", prefix).await? else {
            return Ok(Flow::Continue);
        };
        let Some(form) = self.fill_task_form(TaskForm::from_task(&task)).await? else {
            return Ok(Flow::Quit);
        };
        let changes = match form.validate_changes() {
            Ok(changes) => changes,
            Err(errors) => return self.notice(view::field_errors(&errors).trim_end()).await,
        };
        match ctx.tasks_mut().update_task(&task.id, changes).await {
            Ok(updated) => {
                self.notice(&format!("Updated [{}] {}", updated.id.short(), updated.title))
                    .await
            }
            Err(err) => self.failed(&err).await,
        }
    }

    async fn delete_task<A, P, T>(
        &mut self,
        ctx: &mut AppContext<A, P, T>,
        prefix: &str,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(task) = self.resolve(ctx, "delete", prefix).await? else {
            return Ok(Flow::Continue);
        };
        let Some(answer) = self
            .ask(&format!("Delete \"{}\"? (y/N)", task.title))
            .await?
        else {
            return Ok(Flow::Quit);
        };
        if !answer.trim().eq_ignore_ascii_case("y") {
            return self.notice("Kept").await;
        }
        match ctx.tasks_mut().delete_task(&task.id).await {
            Ok(()) => self.notice(&format!("Deleted [{}]", task.id.short())).await,
            Err(err) => self.failed(&err).await,
        }
    }

    async fn edit_profile<A, P, T>(&mut self, ctx: &mut AppContext<A, P, T>) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let Some(profile) = ctx.session().profile().cloned() else {
            return self.notice("Profile is still loading").await;
        };
        let Some(full_name) = self.ask_with_default("Full name", &profile.full_name).await? else {
            return Ok(Flow::Quit);
        };
        let current_bio = profile.bio.unwrap_or_default();
        let Some(bio) = self.ask_with_default("Bio", &current_bio).await? else {
            return Ok(Flow::Quit);
        };
        let form = ProfileForm { full_name, bio };
        let changes = match form.validate() {
            Ok(changes) => changes,
            Err(errors) => return self.notice(view::field_errors(&errors).trim_end()).await,
        };
        match ctx.session_mut().update_profile(changes).await {
            Ok(()) => self.notice(view::PROFILE_UPDATED).await,
            Err(err) => self.failed(&err).await,
        }
    }

    /// Prompt for every task field, keeping `form`'s values on empty input.
    async fn fill_task_form(&mut self, form: TaskForm) -> io::Result<Option<TaskForm>> {
        let Some(title) = self.ask_with_default("Title", &form.title).await? else {
            return Ok(None);
        };
        let Some(description) = self.ask_with_default("Description", &form.description).await?
        else {
            return Ok(None);
        };
        let Some(status) = self.ask_with_default("Status", &form.status).await? else {
            return Ok(None);
        };
        let Some(priority) = self.ask_with_default("Priority", &form.priority).await? else {
            return Ok(None);
        };
        let Some(due_date) = self
            .ask_with_default("Due date (YYYY-MM-DD)", &form.due_date)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(TaskForm {
            title,
            description: cleared(description),
            status,
            priority,
            due_date: cleared(due_date),
        }))
    }

    /// Find the single task whose id starts with `prefix`.
    async fn resolve<A, P, T>(
        &mut self,
        ctx: &AppContext<A, P, T>,
        verb: &str,
        prefix: &str,
    ) -> io::Result<Option<Arc<Task>>>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        if prefix.is_empty() {
            self.line(&format!("Usage: {verb} <task id>")).await?;
            return Ok(None);
        }
        let matches = ctx.tasks().find_by_prefix(prefix);
        match matches.as_slice() {
            [task] => Ok(Some(Arc::clone(task))),
            [] => {
                self.line(&format!("No task matches '{prefix}'")).await?;
                Ok(None)
            }
            many => {
                self.line(&format!(
                    "'{prefix}' matches {} tasks; use a longer id",
                    many.len()
                ))
                .await?;
                Ok(None)
            }
        }
    }

    async fn switch<A, P, T>(
        &mut self,
        ctx: &AppContext<A, P, T>,
        screen: Screen,
    ) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        self.screen = screen;
        self.render(ctx).await?;
        Ok(Flow::Continue)
    }

    async fn show_tasks<A, P, T>(&mut self, ctx: &AppContext<A, P, T>) -> io::Result<Flow>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        self.screen = Screen::Tasks;
        self.render(ctx).await?;
        Ok(Flow::Continue)
    }

    async fn render<A, P, T>(&mut self, ctx: &AppContext<A, P, T>) -> io::Result<()>
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let text = match self.screen {
            Screen::Login => "Sign in to Task Manager (type help)".to_owned(),
            Screen::SignUp => "Create your account (type help)".to_owned(),
            Screen::Tasks => self.tasks_screen(ctx),
            Screen::Profile => Self::profile_screen(ctx),
        };
        self.line(text.trim_end()).await
    }

    fn tasks_screen<A, P, T>(&self, ctx: &AppContext<A, P, T>) -> String
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let mut text = Self::header(ctx);
        text.push('\n');
        if self.filter.is_active() {
            text.push_str(&view::filter_summary(&self.filter));
            text.push('\n');
        }
        let store = ctx.tasks();
        if let Some(error) = store.error() {
            text.push_str(&format!("! {error}\n"));
        }
        if store.is_loading() {
            text.push_str("Loading tasks...\n");
        } else {
            text.push_str(&view::task_list(&self.filter.apply(store.tasks()), &self.filter));
        }
        text
    }

    fn profile_screen<A, P, T>(ctx: &AppContext<A, P, T>) -> String
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let mut text = Self::header(ctx);
        text.push('\n');
        match ctx.session().profile() {
            Some(profile) => text.push_str(&view::profile_card(profile)),
            None => text.push_str("Loading profile...\n"),
        }
        text
    }

    fn header<A, P, T>(ctx: &AppContext<A, P, T>) -> String
    where
        A: AuthGateway,
        P: ProfileRepository,
        T: TaskRepository,
    {
        let email = ctx
            .session()
            .identity()
            .map_or("", |identity| identity.email().as_ref());
        view::dashboard_header(ctx.session().profile(), email)
    }

    async fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        self.write(&format!("{label}: ")).await?;
        self.lines.next_line().await
    }

    async fn ask_with_default(&mut self, label: &str, current: &str) -> io::Result<Option<String>> {
        let label = if current.is_empty() {
            label.to_owned()
        } else {
            format!("{label} [{current}]")
        };
        let answer = self.ask(&label).await?;
        Ok(answer.map(|input| {
            if input.trim().is_empty() {
                current.to_owned()
            } else {
                input
            }
        }))
    }

    /// Log a failed operation and show its banner.
    async fn failed(&mut self, err: &Error) -> io::Result<Flow> {
        warn!(code = err.code().as_str(), error = %err, screen = ?self.screen, "operation failed");
        self.notice(&view::banner(err)).await
    }

    async fn notice(&mut self, text: &str) -> io::Result<Flow> {
        self.line(text).await?;
        Ok(Flow::Continue)
    }

    async fn line(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }
}

fn cleared(input: String) -> String {
    if input.trim() == CLEAR_MARKER {
        String::new()
    } else {
        input
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
